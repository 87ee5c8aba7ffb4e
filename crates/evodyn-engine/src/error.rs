//! Error types for the batch runner binary.
//!
//! [`EngineError`] wraps every failure that stops the batch as a whole.
//! A single run failing is not one of them; failed runs are logged and
//! counted, and only reported through [`EngineError::RunsFailed`] at the end.

/// Top-level error for the batch runner binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: evodyn_core::ConfigError,
    },

    /// A payoff table in the configuration is malformed.
    #[error("game error: {source}")]
    Game {
        /// The underlying game error.
        #[from]
        source: evodyn_core::GameError,
    },

    /// A configured initial population is not a simplex point.
    #[error("initial population error: {source}")]
    InitialPopulation {
        /// The underlying validation error.
        #[from]
        source: evodyn_types::SimplexError,
    },

    /// Writing a result line failed.
    #[error("output error: {source}")]
    Output {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Serializing a result line failed.
    #[error("serialization error: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// At least one run ended in an error.
    #[error("{failed} of {total} runs failed")]
    RunsFailed {
        /// Number of failed runs.
        failed: u32,
        /// Number of runs in the batch.
        total: u32,
    },
}
