//! Strategy profile enumeration and the payoff cache.
//!
//! A strategy profile assigns one type index to every player slot of an
//! interaction. The profile space is the full Cartesian product of the
//! per-slot type counts, enumerated lexicographically with the **last** slot
//! varying fastest:
//!
//! ```text
//! counts [2, 2]  ->  (0,0) (0,1) (1,0) (1,1)
//! ```
//!
//! Profiles are stored flat, one row of `slots` indices per profile, and the
//! payoff cache mirrors that layout with one row of `slots` payoffs per
//! profile. The cache depends only on the type counts and the payoff
//! function, never on a population, so it is built once per run and read by
//! the step kernel every generation.

use tracing::debug;

use crate::payoff::PayoffFunction;

/// Configuration errors detected while enumerating profiles or building the
/// payoff cache. All of them are fatal and surface before any generation is
/// stepped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    /// The interaction has no player slots (arity 0 or no populations).
    #[error("an interaction needs at least one player slot")]
    NoSlots,

    /// A slot draws from an empty type set.
    #[error("slot {slot} has no types to choose from")]
    EmptyTypeSet {
        /// The slot with zero types.
        slot: usize,
    },

    /// The number of profiles does not fit in memory addressing.
    #[error("profile space of {slots} slots overflows usize")]
    ProfileSpaceOverflow {
        /// Number of slots in the interaction.
        slots: usize,
    },

    /// The payoff function returned the wrong number of payoffs.
    #[error("payoff function returned {actual} payoffs for profile {profile:?}, expected {expected}")]
    PayoffLength {
        /// The profile that was evaluated.
        profile: Vec<usize>,
        /// Number of slots in the profile.
        expected: usize,
        /// Number of payoffs returned.
        actual: usize,
    },

    /// The payoff function returned an infinite or NaN payoff.
    #[error("payoff function returned non-finite payoff {value} for slot {slot} of profile {profile:?}")]
    NonFinitePayoff {
        /// The profile that was evaluated.
        profile: Vec<usize>,
        /// The slot whose payoff is invalid.
        slot: usize,
        /// The offending value.
        value: f64,
    },
}

/// Every strategy profile of an interaction, in enumeration order.
///
/// Always has at least one slot and one profile; the only constructor is
/// [`generate_profiles`], which rejects empty shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSet {
    /// Number of types available to each slot.
    counts: Vec<usize>,
    /// Profiles, `counts.len()` indices per row.
    flat: Vec<usize>,
}

/// Enumerate every profile for the given per-slot type counts.
///
/// # Errors
///
/// Returns [`CacheError::NoSlots`] for an empty `type_counts`,
/// [`CacheError::EmptyTypeSet`] if any count is zero, and
/// [`CacheError::ProfileSpaceOverflow`] if the product of the counts does
/// not fit in a `usize`.
pub fn generate_profiles(type_counts: &[usize]) -> Result<ProfileSet, CacheError> {
    let slots = type_counts.len();
    if slots == 0 {
        return Err(CacheError::NoSlots);
    }
    if let Some(slot) = type_counts.iter().position(|&count| count == 0) {
        return Err(CacheError::EmptyTypeSet { slot });
    }

    let overflow = CacheError::ProfileSpaceOverflow { slots };
    let total = type_counts
        .iter()
        .try_fold(1_usize, |acc, &count| acc.checked_mul(count))
        .ok_or_else(|| overflow.clone())?;
    let capacity = total.checked_mul(slots).ok_or(overflow)?;

    let mut flat = Vec::with_capacity(capacity);
    let mut current = vec![0_usize; slots];
    for _ in 0..total {
        flat.extend_from_slice(&current);
        // Odometer step: bump the last slot, carrying leftwards.
        for (digit, &count) in current.iter_mut().zip(type_counts).rev() {
            *digit = digit.saturating_add(1);
            if *digit < count {
                break;
            }
            *digit = 0;
        }
    }

    Ok(ProfileSet {
        counts: type_counts.to_vec(),
        flat,
    })
}

impl ProfileSet {
    /// Number of player slots per profile.
    pub const fn slots(&self) -> usize {
        self.counts.len()
    }

    /// Number of types available to each slot.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.flat.len().checked_div(self.slots()).unwrap_or(0)
    }

    /// Whether the set has no profiles. Never true for a set produced by
    /// [`generate_profiles`].
    pub const fn is_empty(&self) -> bool {
        self.flat.is_empty()
    }

    /// The profile at position `index` of the enumeration.
    pub fn get(&self, index: usize) -> Option<&[usize]> {
        let start = index.checked_mul(self.slots())?;
        let end = start.checked_add(self.slots())?;
        self.flat.get(start..end)
    }

    /// Iterate over profiles in enumeration order.
    pub fn iter(&self) -> core::slice::ChunksExact<'_, usize> {
        self.flat.chunks_exact(self.slots().max(1))
    }

    /// Position of `profile` in the enumeration, if it is a valid profile.
    pub fn index_of(&self, profile: &[usize]) -> Option<usize> {
        if profile.len() != self.slots() {
            return None;
        }
        profile
            .iter()
            .zip(&self.counts)
            .try_fold(0_usize, |acc, (&digit, &count)| {
                if digit >= count {
                    return None;
                }
                acc.checked_mul(count)?.checked_add(digit)
            })
    }
}

impl<'a> IntoIterator for &'a ProfileSet {
    type Item = &'a [usize];
    type IntoIter = core::slice::ChunksExact<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Dense table of payoffs, one row per profile, indexed like the
/// [`ProfileSet`] it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoffCache {
    profiles: ProfileSet,
    payoffs: Vec<f64>,
}

impl PayoffCache {
    /// Evaluate `payoff` once for every profile and store the results.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::PayoffLength`] if a returned vector does not
    /// have one entry per slot, or [`CacheError::NonFinitePayoff`] if an
    /// entry is infinite or NaN. Evaluation stops at the first bad profile.
    pub fn build<F>(profiles: ProfileSet, payoff: &F) -> Result<Self, CacheError>
    where
        F: PayoffFunction + ?Sized,
    {
        let slots = profiles.slots();
        let mut payoffs = Vec::with_capacity(profiles.flat.len());

        for profile in &profiles {
            let values = payoff.payoffs(profile);
            if values.len() != slots {
                return Err(CacheError::PayoffLength {
                    profile: profile.to_vec(),
                    expected: slots,
                    actual: values.len(),
                });
            }
            if let Some((slot, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
                return Err(CacheError::NonFinitePayoff {
                    profile: profile.to_vec(),
                    slot,
                    value,
                });
            }
            payoffs.extend(values);
        }

        debug!(
            profiles = profiles.len(),
            slots,
            "Payoff cache built"
        );

        Ok(Self { profiles, payoffs })
    }

    /// The profiles the cache was built over.
    pub const fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Number of player slots per profile.
    pub const fn slots(&self) -> usize {
        self.profiles.slots()
    }

    /// Number of cached profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the cache is empty. Never true for a successfully built cache.
    pub const fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Cached payoffs of the profile at position `index`.
    pub fn payoffs(&self, index: usize) -> Option<&[f64]> {
        let slots = self.slots();
        let start = index.checked_mul(slots)?;
        let end = start.checked_add(slots)?;
        self.payoffs.get(start..end)
    }

    /// Iterate over `(profile, payoffs)` rows in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&[usize], &[f64])> + '_ {
        self.profiles
            .iter()
            .zip(self.payoffs.chunks_exact(self.slots().max(1)))
    }
}

/// Enumerate the profiles for `type_counts` and build their payoff cache.
///
/// # Errors
///
/// Propagates any [`CacheError`] from [`generate_profiles`] or
/// [`PayoffCache::build`].
pub fn build_payoff_cache<F>(type_counts: &[usize], payoff: &F) -> Result<PayoffCache, CacheError>
where
    F: PayoffFunction + ?Sized,
{
    PayoffCache::build(generate_profiles(type_counts)?, payoff)
}
