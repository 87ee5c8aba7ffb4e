//! Shared type definitions for the evodyn replicator engine.
//!
//! # Modules
//!
//! - [`simplex`] -- Single-population frequency vectors and the
//!   many-population [`PopulationSet`]
//! - [`type_set`] -- Ordered type labels per population
//! - [`result`] -- Run outcomes and the result tuple returned by a run
//! - [`sum`] -- Exact, order-independent floating-point summation

pub mod result;
pub mod simplex;
pub mod sum;
pub mod type_set;

pub use result::{RunOutcome, RunResult};
pub use simplex::{PopulationSet, SIMPLEX_SUM_TOLERANCE, Simplex, SimplexError};
pub use sum::{ExactSum, fsum};
pub use type_set::TypeSet;
