//! The capability set the generation machine drives.
//!
//! [`Dynamics`] is implemented once for a single symmetric population
//! ([`crate::OnePopulation`]) and once for several asymmetric populations
//! ([`crate::ManyPopulations`]). The machine only ever talks to this trait.

use core::fmt::{Debug, Display};

use evodyn_types::{Simplex, SimplexError, TypeSet, fsum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Exp1;

use crate::kernel::StepError;
use crate::profile::CacheError;

/// Population model plus replicator step for one kind of game.
pub trait Dynamics: Send {
    /// The state stepped each generation.
    type Population: Clone + Debug + Display + PartialEq + Send + AsRef<[Simplex]>;

    /// Enumerate profiles and evaluate the payoff function once per profile.
    ///
    /// Calling this again after a successful build does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the type sets or the payoff function are
    /// misconfigured.
    fn build_cache(&mut self) -> Result<(), CacheError>;

    /// Check that a caller-supplied population fits the type sets.
    ///
    /// # Errors
    ///
    /// Returns [`SimplexError`] if a simplex is invalid or has the wrong
    /// dimensionality.
    fn check_population(&self, population: &Self::Population) -> Result<(), SimplexError>;

    /// Draw a population uniformly from the simplex (or product of simplices).
    fn random_population(&self) -> Self::Population;

    /// A sentinel unequal to every reachable population.
    fn null_population(&self) -> Self::Population;

    /// Equality within [`Dynamics::effective_zero`].
    fn populations_equal(&self, a: &Self::Population, b: &Self::Population) -> bool;

    /// Compute the next generation.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::CacheMissing`] before [`Dynamics::build_cache`]
    /// has succeeded, or any numeric error raised by the kernel.
    fn step(&self, population: &Self::Population) -> Result<Self::Population, StepError>;

    /// Stability tolerance.
    fn effective_zero(&self) -> f64;

    /// One type set per population.
    fn type_sets(&self) -> &[TypeSet];
}

/// Fresh generator for one sampling call.
///
/// A fixed seed gives the same draw every call; without one every call is
/// seeded from the operating system, so parallel runs never share a stream.
pub(crate) fn sampling_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

/// Draw a point uniformly from the `dimension`-simplex (Dirichlet(1)).
///
/// Normalizes `dimension` independent `Exp(1)` draws. The all-zero draw,
/// which has probability zero, falls back to the barycenter.
pub fn random_simplex<R: Rng>(rng: &mut R, dimension: usize) -> Simplex {
    let draws: Vec<f64> = (0..dimension).map(|_| rng.sample::<f64, _>(Exp1)).collect();
    let total = fsum(draws.iter().copied());
    if total > 0.0 && total.is_finite() {
        Simplex::from_raw(draws.into_iter().map(|x| x / total).collect())
    } else {
        let share = 1.0 / f64::from(u32::try_from(dimension).unwrap_or(u32::MAX));
        Simplex::from_raw(vec![share; dimension])
    }
}
