//! The discrete-time replicator step.
//!
//! This module is the per-generation arithmetic and nothing else. Profile
//! enumeration and payoff caching live in [`crate::profile`]; the kernel only
//! reads a finished [`PayoffCache`] and a frequency table, so an alternative
//! (vectorized, SIMD, GPU) implementation can be dropped in behind the
//! [`StepKernel`] trait without touching the generation machine.
//!
//! For background rate `a`, the update for type `i` is
//!
//! ```text
//! x_i' = x_i * (a + u_i) / (a + ubar)
//! ```
//!
//! where `u_i` is the expected payoff of type `i` against the current
//! population and `ubar = sum_i x_i * u_i`. In the one-population case the
//! expected payoff is averaged over the slot the focal player occupies. In
//! the many-population case each population has its own `u_k,i` and `ubar_k`.
//!
//! All payoff sums go through [`ExactSum`], so the result does not depend on
//! profile order.

use evodyn_types::{ExactSum, PopulationSet, Simplex, fsum};

use crate::profile::PayoffCache;

/// Numeric and shape errors raised while stepping a generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    /// `a + ubar` is exactly zero for a population.
    #[error("zero denominator (background rate + average payoff) in population {population}")]
    ZeroDenominator {
        /// Index of the population whose average payoff cancelled the rate.
        population: usize,
    },

    /// The update produced an infinite or NaN frequency.
    #[error("non-finite frequency for type {index} of population {population}")]
    NonFinite {
        /// Index of the population.
        population: usize,
        /// Index of the type.
        index: usize,
    },

    /// The frequencies do not match the shape the cache was built for.
    #[error("population shape {actual:?} does not match payoff cache shape {expected:?}")]
    ShapeMismatch {
        /// Type counts the cache was built for.
        expected: Vec<usize>,
        /// Type counts of the supplied frequencies.
        actual: Vec<usize>,
    },

    /// A step was requested before the payoff cache was built.
    #[error("payoff cache has not been built")]
    CacheMissing,
}

/// Frequencies of several populations stored as one row-major matrix.
///
/// Every row has the width of the largest population. Entries past a
/// population's own dimensionality are padding; they are exactly zero and
/// never read as frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedFrequencies {
    width: usize,
    dimensions: Vec<usize>,
    data: Vec<f64>,
}

impl PaddedFrequencies {
    /// Copy a population set into padded storage.
    pub fn from_populations(populations: &PopulationSet) -> Self {
        let dimensions: Vec<usize> = populations.iter().map(Simplex::dimension).collect();
        let width = dimensions.iter().copied().max().unwrap_or(0);
        let mut data = Vec::with_capacity(width.saturating_mul(dimensions.len()));
        for simplex in populations {
            data.extend_from_slice(simplex.values());
            data.resize(data.len().saturating_add(width.saturating_sub(simplex.dimension())), 0.0);
        }
        Self {
            width,
            dimensions,
            data,
        }
    }

    /// Copy back into one simplex per population, dropping the padding.
    pub fn to_populations(&self) -> PopulationSet {
        (0..self.dimensions.len())
            .map(|k| Simplex::from_raw(self.frequencies(k).unwrap_or_default().to_vec()))
            .collect()
    }

    /// Common row width.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Number of populations.
    pub const fn populations(&self) -> usize {
        self.dimensions.len()
    }

    /// Dimensionality of each population.
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// Full padded row of population `population`.
    pub fn row(&self, population: usize) -> Option<&[f64]> {
        let start = population.checked_mul(self.width)?;
        let end = start.checked_add(self.width)?;
        self.data.get(start..end)
    }

    /// Frequencies of population `population`, without padding.
    pub fn frequencies(&self, population: usize) -> Option<&[f64]> {
        let dimension = *self.dimensions.get(population)?;
        self.row(population)?.get(..dimension)
    }

    /// Frequency of type `index` in population `population`.
    pub fn get(&self, population: usize, index: usize) -> Option<f64> {
        self.frequencies(population)?.get(index).copied()
    }
}

/// Replaceable implementation of the per-generation arithmetic.
pub trait StepKernel: Send + Sync {
    /// Step one symmetric population.
    ///
    /// `frequencies` has one entry per type; every slot of the cache draws
    /// from those same types.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] on a shape mismatch, a zero denominator, or a
    /// non-finite result.
    fn step_one(
        &self,
        frequencies: &[f64],
        cache: &PayoffCache,
        background_rate: f64,
    ) -> Result<Vec<f64>, StepError>;

    /// Step several populations, one per cache slot.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] on a shape mismatch, a zero denominator, or a
    /// non-finite result.
    fn step_many(
        &self,
        frequencies: &PaddedFrequencies,
        cache: &PayoffCache,
        background_rate: f64,
    ) -> Result<PaddedFrequencies, StepError>;
}

/// Scalar kernel with exact payoff accumulation.
///
/// For each profile the weight of "every other slot" is computed with one
/// prefix and one suffix pass, so a profile costs `O(slots)` regardless of
/// which slot is focal.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensatedKernel;

impl StepKernel for CompensatedKernel {
    fn step_one(
        &self,
        frequencies: &[f64],
        cache: &PayoffCache,
        background_rate: f64,
    ) -> Result<Vec<f64>, StepError> {
        let counts = cache.profiles().counts();
        if counts.iter().any(|&count| count != frequencies.len()) {
            return Err(StepError::ShapeMismatch {
                expected: counts.to_vec(),
                actual: vec![frequencies.len(); counts.len()],
            });
        }

        let mut expected = vec![ExactSum::new(); frequencies.len()];
        let mut factors = Vec::with_capacity(cache.slots());
        let mut others = Vec::with_capacity(cache.slots());

        for (profile, payoffs) in cache.iter() {
            factors.clear();
            factors.extend(
                profile
                    .iter()
                    .map(|&ty| frequencies.get(ty).copied().unwrap_or(0.0)),
            );
            exclusive_products(&factors, &mut others);
            for ((&ty, &payoff), &weight) in profile.iter().zip(payoffs).zip(&others) {
                if let Some(acc) = expected.get_mut(ty) {
                    acc.add(payoff * weight);
                }
            }
        }

        let arity = count_as_f64(cache.slots());
        let payoffs: Vec<f64> = expected.iter().map(|acc| acc.total() / arity).collect();
        replicate(0, frequencies, &payoffs, background_rate)
    }

    fn step_many(
        &self,
        frequencies: &PaddedFrequencies,
        cache: &PayoffCache,
        background_rate: f64,
    ) -> Result<PaddedFrequencies, StepError> {
        let counts = cache.profiles().counts();
        if counts != frequencies.dimensions() {
            return Err(StepError::ShapeMismatch {
                expected: counts.to_vec(),
                actual: frequencies.dimensions().to_vec(),
            });
        }

        let mut expected: Vec<Vec<ExactSum>> = counts
            .iter()
            .map(|&count| vec![ExactSum::new(); count])
            .collect();
        let mut factors = Vec::with_capacity(cache.slots());
        let mut others = Vec::with_capacity(cache.slots());

        for (profile, payoffs) in cache.iter() {
            factors.clear();
            factors.extend(
                profile
                    .iter()
                    .enumerate()
                    .map(|(population, &ty)| frequencies.get(population, ty).unwrap_or(0.0)),
            );
            exclusive_products(&factors, &mut others);
            for (((sums, &ty), &payoff), &weight) in
                expected.iter_mut().zip(profile).zip(payoffs).zip(&others)
            {
                if let Some(acc) = sums.get_mut(ty) {
                    acc.add(payoff * weight);
                }
            }
        }

        let width = frequencies.width();
        let mut data = Vec::with_capacity(width.saturating_mul(counts.len()));
        for (population, sums) in expected.iter().enumerate() {
            let current = frequencies.frequencies(population).unwrap_or_default();
            let payoffs: Vec<f64> = sums.iter().map(ExactSum::total).collect();
            let next = replicate(population, current, &payoffs, background_rate)?;
            data.extend_from_slice(&next);
            data.resize(data.len().saturating_add(width.saturating_sub(next.len())), 0.0);
        }

        Ok(PaddedFrequencies {
            width,
            dimensions: frequencies.dimensions.clone(),
            data,
        })
    }
}

/// Apply the replicator update to one population given its expected payoffs.
fn replicate(
    population: usize,
    frequencies: &[f64],
    payoffs: &[f64],
    background_rate: f64,
) -> Result<Vec<f64>, StepError> {
    let average = fsum(frequencies.iter().zip(payoffs).map(|(x, u)| x * u));
    let denominator = background_rate + average;
    if denominator == 0.0 {
        return Err(StepError::ZeroDenominator { population });
    }

    frequencies
        .iter()
        .zip(payoffs)
        .enumerate()
        .map(|(index, (&x, &u))| {
            let next = x * ((background_rate + u) / denominator);
            if next.is_finite() {
                Ok(next)
            } else {
                Err(StepError::NonFinite { population, index })
            }
        })
        .collect()
}

/// Fill `out[k]` with the product of every factor except `factors[k]`.
fn exclusive_products(factors: &[f64], out: &mut Vec<f64>) {
    out.clear();
    let mut prefix = 1.0;
    for &factor in factors {
        out.push(prefix);
        prefix *= factor;
    }
    let mut suffix = 1.0;
    for (slot, &factor) in out.iter_mut().zip(factors).rev() {
        *slot *= suffix;
        suffix *= factor;
    }
}

/// Convert a slot or type count to `f64`. Counts are tiny in practice.
fn count_as_f64(count: usize) -> f64 {
    u32::try_from(count).map_or(f64::from(u32::MAX), f64::from)
}
