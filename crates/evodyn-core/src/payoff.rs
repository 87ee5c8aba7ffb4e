//! User-supplied payoff functions.
//!
//! A payoff function maps one strategy profile (a type index per player
//! slot) to the payoff each slot receives. The engine calls it exactly once
//! per profile when the payoff cache is built, never per generation.
//!
//! Payoff functions are shared by every concurrently running simulation that
//! uses them, so they must be pure and `Send + Sync`.

/// Maps a strategy profile to one payoff per player slot.
///
/// The returned vector must have exactly `profile.len()` entries, all
/// finite. Anything else is a configuration error reported when the payoff
/// cache is built.
pub trait PayoffFunction: Send + Sync {
    /// Payoffs for every slot of `profile`, in slot order.
    fn payoffs(&self, profile: &[usize]) -> Vec<f64>;
}

impl<F> PayoffFunction for F
where
    F: Fn(&[usize]) -> Vec<f64> + Send + Sync,
{
    fn payoffs(&self, profile: &[usize]) -> Vec<f64> {
        self(profile)
    }
}

/// Adapter for payoff functions written one slot at a time.
///
/// Wraps `f(place, profile) -> payoff` and evaluates it for every place of
/// the profile.
///
/// ```
/// use evodyn_core::payoff::{PayoffFunction, PerPlayer};
///
/// let table = [[3.0, 0.0], [4.0, 1.0]];
/// let pd = PerPlayer(move |place: usize, profile: &[usize]| {
///     let me = profile.get(place).copied().unwrap_or(0);
///     let other = profile.get(1 - place).copied().unwrap_or(0);
///     table[me][other]
/// });
/// assert_eq!(pd.payoffs(&[0, 1]), vec![0.0, 4.0]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PerPlayer<F>(pub F);

impl<F> PayoffFunction for PerPlayer<F>
where
    F: Fn(usize, &[usize]) -> f64 + Send + Sync,
{
    fn payoffs(&self, profile: &[usize]) -> Vec<f64> {
        (0..profile.len())
            .map(|place| (self.0)(place, profile))
            .collect()
    }
}
