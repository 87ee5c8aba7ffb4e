//! Ordered type labels for one population.

use serde::{Deserialize, Serialize};

/// The ordered, immutable list of type labels of one population.
///
/// The number of labels is the dimensionality of the population's simplex.
/// An empty type set is representable so that configuration can be loaded
/// as-is; the engine rejects it when it builds the payoff cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeSet(Vec<String>);

impl TypeSet {
    /// Create a type set from its labels.
    pub const fn new(labels: Vec<String>) -> Self {
        Self(labels)
    }

    /// Number of types.
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the type set has no types.
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All labels in type order.
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Label of type `index`, if it exists.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for TypeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
