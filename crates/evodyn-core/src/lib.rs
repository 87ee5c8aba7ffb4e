//! Discrete-time replicator dynamics for the evodyn engine.
//!
//! A run owns a [`Dynamics`] (one symmetric population or several
//! asymmetric ones), and a [`GenerationMachine`] steps it generation by
//! generation until two consecutive generations are equal within the
//! effective zero or an observer raises the force-stop flag.
//!
//! # Modules
//!
//! - [`config`] -- Experiment configuration loaded from YAML.
//! - [`payoff`] -- The [`PayoffFunction`] trait and adapters.
//! - [`games`] -- Built-in symmetric and bimatrix games.
//! - [`profile`] -- Profile enumeration and the payoff cache.
//! - [`kernel`] -- The replicator step behind the [`StepKernel`] seam.
//! - [`dynamics`] -- The [`Dynamics`] capability trait and simplex sampling.
//! - [`one_population`] / [`many_populations`] -- The two specializations.
//! - [`observer`] -- Lifecycle notifications and [`RunControl`].
//! - [`machine`] -- The generation-stepping state machine.
//! - [`policy`] -- Termination policies such as [`GenerationCap`].
//! - [`report`] -- Logging and result-data observers.

pub mod config;
pub mod dynamics;
pub mod games;
pub mod kernel;
pub mod machine;
pub mod many_populations;
pub mod observer;
pub mod one_population;
pub mod payoff;
pub mod policy;
pub mod profile;
pub mod report;

pub use config::{ConfigError, DynamicsConfig, ExperimentConfig, GameConfig};
pub use dynamics::{Dynamics, random_simplex};
pub use games::{BimatrixGame, GameError, SymmetricMatrixGame};
pub use kernel::{CompensatedKernel, PaddedFrequencies, StepError, StepKernel};
pub use machine::{GenerationMachine, MachineError, MachineState};
pub use many_populations::ManyPopulations;
pub use observer::{GenerationObserver, NoOpObserver, RunControl, TerminalReport};
pub use one_population::OnePopulation;
pub use payoff::{PayoffFunction, PerPlayer};
pub use policy::GenerationCap;
pub use profile::{CacheError, PayoffCache, ProfileSet, build_payoff_cache, generate_profiles};
pub use report::{SupportSummary, TracingObserver};
