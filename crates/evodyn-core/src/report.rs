//! Reporting observers.
//!
//! [`TracingObserver`] turns lifecycle notifications into `tracing` events.
//! [`SupportSummary`] attaches the surviving types of the final population
//! to the run result.

use core::fmt::Display;

use evodyn_types::{Simplex, TypeSet};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::dynamics::Dynamics;
use crate::observer::{GenerationObserver, RunControl, TerminalReport};

/// Logs the initial state, each generation (optionally), and the terminal
/// state with its support.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    type_sets: Vec<TypeSet>,
    effective_zero: f64,
    generation_reports: bool,
}

impl TracingObserver {
    /// Observer labelling types from `type_sets`.
    pub const fn new(type_sets: Vec<TypeSet>, effective_zero: f64, generation_reports: bool) -> Self {
        Self {
            type_sets,
            effective_zero,
            generation_reports,
        }
    }

    /// Observer matching the type sets and tolerance of `dynamics`.
    pub fn for_dynamics<D: Dynamics>(dynamics: &D, generation_reports: bool) -> Self {
        Self::new(
            dynamics.type_sets().to_vec(),
            dynamics.effective_zero(),
            generation_reports,
        )
    }

    fn log_support(&self, populations: &[Simplex]) {
        for (population, (simplex, types)) in populations.iter().zip(&self.type_sets).enumerate() {
            for index in simplex.support(self.effective_zero) {
                info!(
                    population,
                    index,
                    label = types.label(index).unwrap_or("?"),
                    frequency = simplex.get(index).unwrap_or(0.0),
                    "Surviving type"
                );
            }
        }
    }
}

impl<P: AsRef<[Simplex]> + Display> GenerationObserver<P> for TracingObserver {
    fn on_initial_set(&mut self, initial: &P, _control: &mut RunControl) {
        info!(initial = %initial, "Initial state");
    }

    fn on_generation(&mut self, generation: u64, current: &P, _previous: &P, _control: &mut RunControl) {
        if self.generation_reports {
            debug!(generation, population = %current, "Generation");
        }
    }

    fn on_stable_state(&mut self, report: &TerminalReport<'_, P>, _control: &mut RunControl) {
        info!(
            generations = report.generation_count,
            final_population = %report.final_population,
            "Stable state"
        );
        self.log_support(report.final_population.as_ref());
    }

    fn on_force_stop(&mut self, report: &TerminalReport<'_, P>, _control: &mut RunControl) {
        warn!(
            generations = report.generation_count,
            final_population = %report.final_population,
            "Force stop"
        );
        self.log_support(report.final_population.as_ref());
    }
}

/// Sets `result_data` to `{"support": [...]}` when the run ends.
///
/// The support lists, per population, every type whose final frequency
/// exceeds the effective zero.
#[derive(Debug, Clone)]
pub struct SupportSummary {
    type_sets: Vec<TypeSet>,
    effective_zero: f64,
}

impl SupportSummary {
    /// Summary labelling types from `type_sets`.
    pub const fn new(type_sets: Vec<TypeSet>, effective_zero: f64) -> Self {
        Self {
            type_sets,
            effective_zero,
        }
    }

    /// Summary matching the type sets and tolerance of `dynamics`.
    pub fn for_dynamics<D: Dynamics>(dynamics: &D) -> Self {
        Self::new(dynamics.type_sets().to_vec(), dynamics.effective_zero())
    }

    /// The `result_data` payload for `populations`.
    pub fn summarize(&self, populations: &[Simplex]) -> serde_json::Value {
        let support: Vec<serde_json::Value> = populations
            .iter()
            .zip(&self.type_sets)
            .map(|(simplex, types)| {
                simplex
                    .support(self.effective_zero)
                    .map(|index| {
                        json!({
                            "index": index,
                            "label": types.label(index),
                            "frequency": simplex.get(index),
                        })
                    })
                    .collect()
            })
            .collect();
        json!({ "support": support })
    }
}

impl<P: AsRef<[Simplex]>> GenerationObserver<P> for SupportSummary {
    fn on_stable_state(&mut self, report: &TerminalReport<'_, P>, control: &mut RunControl) {
        control.result_data = Some(self.summarize(report.final_population.as_ref()));
    }

    fn on_force_stop(&mut self, report: &TerminalReport<'_, P>, control: &mut RunControl) {
        control.result_data = Some(self.summarize(report.final_population.as_ref()));
    }
}
