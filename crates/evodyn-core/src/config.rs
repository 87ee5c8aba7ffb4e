//! Experiment configuration and its YAML loader.
//!
//! An experiment file describes one game, the replicator parameters, and how
//! many independent duplicate runs to perform. Every field has a default so
//! that an empty file (or no file at all) describes a two-type symmetric
//! Prisoner's Dilemma.
//!
//! ```yaml
//! experiment:
//!   name: "pd"
//!   duplicates: 8
//!   max_generations: 10000
//! dynamics:
//!   effective_zero: 1.0e-10
//!   background_rate: 0.0
//! game:
//!   kind: one_population
//!   types: ["C", "D"]
//!   interaction_arity: 2
//!   payoffs: [[3, 0], [4, 1]]
//! logging:
//!   level: "info"
//!   generation_reports: false
//! ```

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible experiment.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level experiment configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExperimentConfig {
    /// Batch settings.
    #[serde(default)]
    pub experiment: ExperimentSection,

    /// Replicator parameters shared by every run.
    #[serde(default)]
    pub dynamics: DynamicsConfig,

    /// The game being played.
    #[serde(default)]
    pub game: GameConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ExperimentConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Check the values that serde cannot check.
    ///
    /// Game tables are validated separately when the game is built.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.experiment.duplicates == 0 {
            return Err(invalid("experiment.duplicates must be at least 1"));
        }
        self.dynamics.validate()?;
        match &self.game {
            GameConfig::OnePopulation {
                types,
                interaction_arity,
                initial_population,
                ..
            } => {
                if *interaction_arity != 2 {
                    return Err(invalid(format!(
                        "game.interaction_arity is {interaction_arity}, matrix games pay two-player interactions only"
                    )));
                }
                if types.is_empty() {
                    return Err(invalid("game.types must name at least one type"));
                }
                if let Some(initial) = initial_population
                    && initial.len() != types.len()
                {
                    return Err(invalid(format!(
                        "game.initial_population has {} entries for {} types",
                        initial.len(),
                        types.len()
                    )));
                }
            }
            GameConfig::TwoPopulations {
                types,
                initial_population,
                ..
            } => {
                if types.len() != 2 {
                    return Err(invalid(format!(
                        "game.types lists {} populations, two_populations needs 2",
                        types.len()
                    )));
                }
                if types.iter().any(Vec::is_empty) {
                    return Err(invalid("every population in game.types needs a type"));
                }
                if let Some(initial) = initial_population {
                    let shapes_match = initial.len() == types.len()
                        && initial.iter().zip(types).all(|(x, t)| x.len() == t.len());
                    if !shapes_match {
                        return Err(invalid(
                            "game.initial_population does not match the shape of game.types",
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

/// Batch-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExperimentSection {
    /// Human-readable experiment name, echoed in every result line.
    #[serde(default = "default_experiment_name")]
    pub name: String,

    /// Number of independent runs.
    #[serde(default = "default_duplicates")]
    pub duplicates: u32,

    /// Force-stop a run after this many generations. 0 disables the cap.
    #[serde(default)]
    pub max_generations: u64,
}

impl Default for ExperimentSection {
    fn default() -> Self {
        Self {
            name: default_experiment_name(),
            duplicates: default_duplicates(),
            max_generations: 0,
        }
    }
}

/// Parameters of the replicator update and the stability test.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DynamicsConfig {
    /// Two populations are equal unless some entry differs by more than this.
    #[serde(default = "default_effective_zero")]
    pub effective_zero: f64,

    /// Baseline reproduction rate added to every payoff.
    #[serde(default)]
    pub background_rate: f64,

    /// Seed for random initial populations. Unset means OS entropy per draw.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl DynamicsConfig {
    /// Check tolerance and rate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `effective_zero` is not a
    /// positive finite number or `background_rate` is not finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.effective_zero.is_finite() && self.effective_zero > 0.0) {
            return Err(invalid(format!(
                "dynamics.effective_zero must be positive, got {}",
                self.effective_zero
            )));
        }
        if !self.background_rate.is_finite() {
            return Err(invalid(format!(
                "dynamics.background_rate must be finite, got {}",
                self.background_rate
            )));
        }
        Ok(())
    }
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            effective_zero: default_effective_zero(),
            background_rate: 0.0,
            seed: None,
        }
    }
}

/// The game played by the populations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameConfig {
    /// One anonymous population playing a symmetric game against itself.
    OnePopulation {
        /// Type labels.
        #[serde(default = "default_one_population_types")]
        types: Vec<String>,
        /// Player slots per interaction. Matrix games require 2.
        #[serde(default = "default_interaction_arity")]
        interaction_arity: u32,
        /// Square payoff table: `payoffs[me][other]`.
        #[serde(default = "default_payoffs")]
        payoffs: Vec<Vec<f64>>,
        /// Explicit starting frequencies; drawn at random when absent.
        #[serde(default)]
        initial_population: Option<Vec<f64>>,
    },

    /// Two populations, one per player role.
    TwoPopulations {
        /// Type labels per population.
        #[serde(default = "default_two_population_types")]
        types: Vec<Vec<String>>,
        /// Row player payoffs: `row_payoffs[row][column]`.
        #[serde(default = "default_payoffs")]
        row_payoffs: Vec<Vec<f64>>,
        /// Column player payoffs, indexed the same way. Defaults to the
        /// transpose of `row_payoffs`, i.e. a symmetric game.
        #[serde(default)]
        column_payoffs: Option<Vec<Vec<f64>>>,
        /// Explicit starting frequencies per population.
        #[serde(default)]
        initial_population: Option<Vec<Vec<f64>>>,
    },
}

impl GameConfig {
    /// Short name of the variant, used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OnePopulation { .. } => "one_population",
            Self::TwoPopulations { .. } => "two_populations",
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::OnePopulation {
            types: vec!["C".to_owned(), "D".to_owned()],
            interaction_arity: default_interaction_arity(),
            payoffs: default_payoffs(),
            initial_population: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit a `debug` event for every generation.
    #[serde(default)]
    pub generation_reports: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            generation_reports: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_experiment_name() -> String {
    "experiment".to_owned()
}

const fn default_duplicates() -> u32 {
    1
}

const fn default_effective_zero() -> f64 {
    1e-10
}

fn default_one_population_types() -> Vec<String> {
    vec!["A".to_owned(), "B".to_owned()]
}

fn default_two_population_types() -> Vec<Vec<String>> {
    vec![
        vec!["A".to_owned(), "B".to_owned()],
        vec!["C".to_owned(), "D".to_owned()],
    ]
}

const fn default_interaction_arity() -> u32 {
    2
}

fn default_payoffs() -> Vec<Vec<f64>> {
    vec![vec![3.0, 0.0], vec![4.0, 1.0]]
}

fn default_log_level() -> String {
    "info".to_owned()
}
