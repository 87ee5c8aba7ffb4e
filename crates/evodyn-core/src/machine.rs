//! The generation-stepping state machine.
//!
//! ```text
//! Initial --> Stepping --> Stable
//!                     \--> ForcedStop
//! (any configuration or numeric error) --> Failed
//! ```
//!
//! In `Initial` the machine accepts or draws the initial population,
//! notifies observers, and builds the payoff cache. In `Stepping` it applies
//! the replicator step until two consecutive generations are equal within
//! the effective zero or an observer raises `force_stop`. The flag is read
//! once per generation boundary, after the step that raised it, so that
//! step's progress is kept. Without a stop policy a run that never settles
//! loops forever.
//!
//! A machine runs once. Calling [`GenerationMachine::run`] a second time
//! fails with [`MachineError::AlreadyRun`].

use evodyn_types::{RunOutcome, RunResult, SimplexError};
use tracing::debug;

use crate::dynamics::Dynamics;
use crate::kernel::StepError;
use crate::observer::{GenerationObserver, RunControl, TerminalReport};
use crate::profile::CacheError;

/// Where a machine is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// Constructed, not yet run.
    Initial,
    /// Stepping generations.
    Stepping,
    /// Terminated on two equal consecutive generations.
    Stable,
    /// Terminated on the force-stop flag.
    ForcedStop,
    /// Terminated on an error without reaching a terminal result.
    Failed,
}

impl MachineState {
    /// Whether the machine can no longer change state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stable | Self::ForcedStop | Self::Failed)
    }
}

/// Errors that end a run without a result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MachineError {
    /// The supplied initial population does not fit the type sets.
    #[error("invalid initial population: {source}")]
    Population {
        /// The validation failure.
        #[from]
        source: SimplexError,
    },

    /// The payoff cache could not be built.
    #[error("invalid game configuration: {source}")]
    Cache {
        /// The cache build failure.
        #[from]
        source: CacheError,
    },

    /// A generation could not be computed.
    #[error("generation {generation} failed: {source}")]
    Step {
        /// The generation being computed.
        generation: u64,
        /// The numeric failure.
        source: StepError,
    },

    /// The generation counter reached `u64::MAX`.
    #[error("generation counter overflowed")]
    GenerationOverflow,

    /// `run` was called on a machine that is not in its initial state.
    #[error("machine already ran (state {state:?})")]
    AlreadyRun {
        /// The state the machine was in.
        state: MachineState,
    },
}

impl MachineError {
    /// Whether this is a configuration error, raised before any generation.
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Population { .. } | Self::Cache { .. })
    }
}

/// Drives one [`Dynamics`] from its initial population to a terminal state.
#[derive(Debug)]
pub struct GenerationMachine<D> {
    dynamics: D,
    state: MachineState,
}

impl<D: Dynamics> GenerationMachine<D> {
    /// Wrap a configured dynamics. Nothing is computed until [`Self::run`].
    pub const fn new(dynamics: D) -> Self {
        Self {
            dynamics,
            state: MachineState::Initial,
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> MachineState {
        self.state
    }

    /// The wrapped dynamics.
    pub const fn dynamics(&self) -> &D {
        &self.dynamics
    }

    /// Give back the wrapped dynamics.
    pub fn into_dynamics(self) -> D {
        self.dynamics
    }

    /// Run to a terminal state.
    ///
    /// `initial` is validated if given, drawn at random otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Population`] or [`MachineError::Cache`]
    /// before any generation is stepped, [`MachineError::Step`] if a
    /// generation fails, and [`MachineError::AlreadyRun`] on reuse. The
    /// machine is left in [`MachineState::Failed`] on every error but
    /// `AlreadyRun`, and no terminal notification is sent.
    pub fn run(
        &mut self,
        initial: Option<D::Population>,
        observer: &mut dyn GenerationObserver<D::Population>,
    ) -> Result<RunResult<D::Population>, MachineError> {
        if self.state != MachineState::Initial {
            return Err(MachineError::AlreadyRun { state: self.state });
        }
        let result = self.drive(initial, observer);
        if let Err(err) = &result {
            self.state = MachineState::Failed;
            debug!(error = %err, "Run failed");
        }
        result
    }

    fn drive(
        &mut self,
        initial: Option<D::Population>,
        observer: &mut dyn GenerationObserver<D::Population>,
    ) -> Result<RunResult<D::Population>, MachineError> {
        let initial = match initial {
            Some(population) => {
                self.dynamics.check_population(&population)?;
                population
            }
            None => self.dynamics.random_population(),
        };

        let mut control = RunControl::default();
        observer.on_initial_set(&initial, &mut control);
        self.dynamics.build_cache()?;

        self.state = MachineState::Stepping;
        debug!(initial = %initial, "Stepping started");

        let mut generation: u64 = 0;
        let mut previous = self.dynamics.null_population();
        let mut current = initial.clone();

        while !self.dynamics.populations_equal(&previous, &current) && !control.force_stop {
            generation = generation
                .checked_add(1)
                .ok_or(MachineError::GenerationOverflow)?;
            let next = self
                .dynamics
                .step(&current)
                .map_err(|source| MachineError::Step { generation, source })?;
            previous = core::mem::replace(&mut current, next);
            observer.on_generation(generation, &current, &previous, &mut control);
        }

        let report = TerminalReport {
            generation_count: generation,
            final_population: &current,
            previous: &previous,
            initial: &initial,
        };
        let outcome = if control.force_stop {
            self.state = MachineState::ForcedStop;
            observer.on_force_stop(&report, &mut control);
            RunOutcome::ForcedStop
        } else {
            self.state = MachineState::Stable;
            observer.on_stable_state(&report, &mut control);
            RunOutcome::Stable
        };

        debug!(generations = generation, outcome = %outcome, "Stepping finished");

        Ok(RunResult {
            generation_count: generation,
            initial,
            final_population: current,
            previous,
            outcome,
            result_data: control.result_data,
        })
    }
}
