//! Points on the probability simplex.
//!
//! A [`Simplex`] holds the type frequencies of one population. Entries are
//! non-negative and sum to 1. Frequencies produced by the replicator kernel
//! are wrapped with [`Simplex::from_raw`] and are never clamped or
//! renormalized; the simplex property of kernel output is something the
//! tests check, not something this type enforces.
//!
//! [`PopulationSet`] is the many-population state: one simplex per
//! population, possibly of different dimensionalities.

use serde::{Deserialize, Serialize};

use crate::sum::fsum;

/// Tolerance used when validating that caller-supplied frequencies sum to 1.
pub const SIMPLEX_SUM_TOLERANCE: f64 = 1e-9;

/// Errors raised when validating a caller-supplied simplex point.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimplexError {
    /// The vector has no entries.
    #[error("a simplex point needs at least one entry")]
    Empty,

    /// An entry is negative, infinite or NaN.
    #[error("entry {index} is not a valid frequency: {value}")]
    InvalidEntry {
        /// Position of the offending entry.
        index: usize,
        /// The offending value.
        value: f64,
    },

    /// The entries do not sum to 1.
    #[error("frequencies sum to {total}, expected 1")]
    NotNormalized {
        /// The exact sum of the entries.
        total: f64,
    },

    /// The vector does not have the dimensionality of its type set.
    #[error("expected {expected} frequencies, got {actual}")]
    Dimension {
        /// Number of types in the population.
        expected: usize,
        /// Number of entries supplied.
        actual: usize,
    },

    /// A population set has the wrong number of populations.
    #[error("expected {expected} populations, got {actual}")]
    PopulationCount {
        /// Number of type sets.
        expected: usize,
        /// Number of simplices supplied.
        actual: usize,
    },
}

/// Type frequencies of a single population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Simplex(Vec<f64>);

impl Simplex {
    /// Validate and wrap a frequency vector.
    ///
    /// # Errors
    ///
    /// Returns [`SimplexError`] if the vector is empty, contains a negative
    /// or non-finite entry, or does not sum to 1 within
    /// [`SIMPLEX_SUM_TOLERANCE`].
    pub fn new(values: Vec<f64>) -> Result<Self, SimplexError> {
        if values.is_empty() {
            return Err(SimplexError::Empty);
        }
        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(SimplexError::InvalidEntry { index, value });
            }
        }
        let total = fsum(values.iter().copied());
        if (total - 1.0).abs() > SIMPLEX_SUM_TOLERANCE {
            return Err(SimplexError::NotNormalized { total });
        }
        Ok(Self(values))
    }

    /// Wrap a frequency vector without validation.
    pub const fn from_raw(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// The null sentinel: all zeros, never equal to a reachable population.
    pub fn zeros(dimension: usize) -> Self {
        Self(vec![0.0; dimension])
    }

    /// The pure population where every individual has type `index`.
    ///
    /// An out-of-range `index` yields the null sentinel.
    pub fn vertex(dimension: usize, index: usize) -> Self {
        let mut values = vec![0.0; dimension];
        if let Some(slot) = values.get_mut(index) {
            *slot = 1.0;
        }
        Self(values)
    }

    /// Number of types.
    pub const fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Frequency of type `index`, if it exists.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }

    /// All frequencies in type order.
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Consume the simplex and return the raw frequencies.
    pub fn into_values(self) -> Vec<f64> {
        self.0
    }

    /// Correctly rounded sum of the frequencies.
    pub fn total(&self) -> f64 {
        fsum(self.0.iter().copied())
    }

    /// Element-wise equality within `tolerance`.
    ///
    /// Two entries count as equal unless they differ by strictly more than
    /// `tolerance`. Simplices of different dimensionality are never equal.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.0.len() == other.0.len()
            && !self
                .0
                .iter()
                .zip(&other.0)
                .any(|(a, b)| (a - b).abs() > tolerance)
    }

    /// Indices of types with frequency strictly above `tolerance`.
    pub fn support(&self, tolerance: f64) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(move |&(_, &value)| value.abs() > tolerance)
            .map(|(index, _)| index)
    }

    /// Check that this simplex has exactly `expected` entries.
    ///
    /// # Errors
    ///
    /// Returns [`SimplexError::Dimension`] on mismatch.
    pub const fn check_dimension(&self, expected: usize) -> Result<(), SimplexError> {
        if self.0.len() == expected {
            Ok(())
        } else {
            Err(SimplexError::Dimension {
                expected,
                actual: self.0.len(),
            })
        }
    }
}

impl AsRef<[Self]> for Simplex {
    fn as_ref(&self) -> &[Self] {
        core::slice::from_ref(self)
    }
}

impl core::fmt::Display for Simplex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "(")?;
        for (index, value) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, ")")
    }
}

/// The joint state of several populations, one simplex each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PopulationSet(Vec<Simplex>);

impl PopulationSet {
    /// Wrap a list of per-population simplices.
    pub const fn new(populations: Vec<Simplex>) -> Self {
        Self(populations)
    }

    /// Number of populations.
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no populations at all.
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The simplex of population `index`, if it exists.
    pub fn get(&self, index: usize) -> Option<&Simplex> {
        self.0.get(index)
    }

    /// Iterate over the per-population simplices.
    pub fn iter(&self) -> core::slice::Iter<'_, Simplex> {
        self.0.iter()
    }

    /// Consume the set and return its simplices.
    pub fn into_inner(self) -> Vec<Simplex> {
        self.0
    }

    /// Per-population equality within `tolerance`.
    ///
    /// Requires the same number of populations and every pair of simplices
    /// to pass [`Simplex::approx_eq`].
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.approx_eq(b, tolerance))
    }
}

impl AsRef<[Simplex]> for PopulationSet {
    fn as_ref(&self) -> &[Simplex] {
        &self.0
    }
}

impl FromIterator<Simplex> for PopulationSet {
    fn from_iter<I: IntoIterator<Item = Simplex>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PopulationSet {
    type Item = &'a Simplex;
    type IntoIter = core::slice::Iter<'a, Simplex>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl core::fmt::Display for PopulationSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[")?;
        for (index, simplex) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{simplex}")?;
        }
        write!(f, "]")
    }
}
