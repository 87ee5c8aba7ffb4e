//! Parallel execution of duplicate runs.
//!
//! Every duplicate is an independent [`GenerationMachine`] run on a blocking
//! worker thread. The validated game is built once and shared behind an
//! `Arc`; nothing else is shared between runs. With a configured seed, run
//! `i` samples its initial population from `seed + i` so duplicates differ
//! but the batch is reproducible.

use std::io::Write;
use std::sync::Arc;

use evodyn_core::{
    BimatrixGame, ConfigError, Dynamics, DynamicsConfig, ExperimentConfig, GameConfig, GenerationCap,
    GenerationMachine, MachineError, ManyPopulations, OnePopulation, PayoffFunction,
    SupportSummary, SymmetricMatrixGame, TracingObserver,
};
use evodyn_types::{PopulationSet, RunOutcome, RunResult, Simplex, TypeSet};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, info_span};

use crate::error::EngineError;

/// A game validated from configuration, ready to be instantiated per run.
#[derive(Debug, Clone)]
pub enum PreparedGame {
    /// One symmetric population.
    OnePopulation {
        /// Type labels.
        types: TypeSet,
        /// Player slots per interaction.
        interaction_arity: usize,
        /// The payoff table.
        game: Arc<SymmetricMatrixGame>,
        /// Explicit initial population, if configured.
        initial: Option<Simplex>,
    },
    /// Two populations playing a bimatrix game.
    TwoPopulations {
        /// Type labels per population.
        types: Vec<TypeSet>,
        /// The payoff tables.
        game: Arc<BimatrixGame>,
        /// Explicit initial populations, if configured.
        initial: Option<PopulationSet>,
    },
}

impl PreparedGame {
    /// Validate the payoff tables and initial populations of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Game`] for a malformed table,
    /// [`EngineError::Config`] for a table whose dimensions do not match the
    /// type sets, and [`EngineError::InitialPopulation`] for an initial
    /// population that is not a simplex point.
    pub fn from_config(config: &GameConfig) -> Result<Self, EngineError> {
        match config {
            GameConfig::OnePopulation {
                types,
                interaction_arity,
                payoffs,
                initial_population,
            } => {
                let game = SymmetricMatrixGame::new(payoffs)?;
                if game.strategies() != types.len() {
                    return Err(table_mismatch(format!(
                        "game.payoffs is {n}x{n} but game.types names {} types",
                        types.len(),
                        n = game.strategies()
                    )));
                }
                Ok(Self::OnePopulation {
                    types: types.iter().cloned().collect(),
                    interaction_arity: usize::try_from(*interaction_arity).unwrap_or(usize::MAX),
                    game: Arc::new(game),
                    initial: initial_population
                        .as_ref()
                        .map(|values| Simplex::new(values.clone()))
                        .transpose()?,
                })
            }
            GameConfig::TwoPopulations {
                types,
                row_payoffs,
                column_payoffs,
                initial_population,
            } => {
                let game = match column_payoffs {
                    Some(column) => BimatrixGame::new(row_payoffs, column)?,
                    None => BimatrixGame::symmetric(row_payoffs)?,
                };
                let (rows, columns) = game.shape();
                let counts: Vec<usize> = types.iter().map(Vec::len).collect();
                if counts != [rows, columns] {
                    return Err(table_mismatch(format!(
                        "game tables are {rows}x{columns} but game.types has shape {counts:?}"
                    )));
                }
                let initial = initial_population
                    .as_ref()
                    .map(|populations| {
                        populations
                            .iter()
                            .map(|values| Simplex::new(values.clone()))
                            .collect::<Result<PopulationSet, _>>()
                    })
                    .transpose()?;
                Ok(Self::TwoPopulations {
                    types: types
                        .iter()
                        .map(|labels| labels.iter().cloned().collect())
                        .collect(),
                    game: Arc::new(game),
                    initial,
                })
            }
        }
    }
}

fn table_mismatch(reason: String) -> EngineError {
    EngineError::Config {
        source: ConfigError::Invalid { reason },
    }
}

/// Settings shared by every run of a batch.
#[derive(Debug, Clone)]
struct RunSettings {
    experiment: String,
    dynamics: DynamicsConfig,
    max_generations: u64,
    generation_reports: bool,
}

impl RunSettings {
    fn from_config(config: &ExperimentConfig) -> Self {
        Self {
            experiment: config.experiment.name.clone(),
            dynamics: config.dynamics,
            max_generations: config.experiment.max_generations,
            generation_reports: config.logging.generation_reports,
        }
    }

    /// Dynamics parameters for run `index`.
    fn dynamics_for(&self, index: u32) -> DynamicsConfig {
        DynamicsConfig {
            seed: self
                .dynamics
                .seed
                .map(|seed| seed.wrapping_add(u64::from(index))),
            ..self.dynamics
        }
    }
}

/// One JSON line of output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    /// Experiment name.
    pub experiment: String,
    /// Index of the run within the batch.
    pub run: u32,
    /// Generations stepped.
    pub generation_count: u64,
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Starting frequencies, one array per population.
    pub initial: Vec<Simplex>,
    /// Final frequencies, one array per population.
    pub final_population: Vec<Simplex>,
    /// Listener-attached payload.
    pub result_data: Option<serde_json::Value>,
}

impl RunRecord {
    fn from_result<P: AsRef<[Simplex]>>(experiment: String, run: u32, result: RunResult<P>) -> Self {
        Self {
            experiment,
            run,
            generation_count: result.generation_count,
            outcome: result.outcome,
            initial: result.initial.as_ref().to_vec(),
            final_population: result.final_population.as_ref().to_vec(),
            result_data: result.result_data,
        }
    }
}

/// Counts over a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Runs in the batch.
    pub total: u32,
    /// Runs that reached a stable state.
    pub stable: u32,
    /// Runs that were force-stopped.
    pub forced: u32,
    /// Runs that ended in an error.
    pub failed: u32,
    /// Sum of generation counts over successful runs.
    pub total_generations: u64,
}

impl BatchSummary {
    /// Mean generation count over successful runs, 0 if there were none.
    pub fn mean_generations(&self) -> f64 {
        let finished = self.stable.saturating_add(self.forced);
        if finished == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let total = self.total_generations as f64;
        total / f64::from(finished)
    }

    fn record(&mut self, record: &RunRecord) {
        match record.outcome {
            RunOutcome::Stable => self.stable = self.stable.saturating_add(1),
            RunOutcome::ForcedStop => self.forced = self.forced.saturating_add(1),
        }
        self.total_generations = self.total_generations.saturating_add(record.generation_count);
    }
}

/// Run one dynamics to completion with the standard observers.
fn execute<D: Dynamics>(
    dynamics: D,
    initial: Option<D::Population>,
    settings: &RunSettings,
) -> Result<RunResult<D::Population>, MachineError> {
    let mut observers = (
        (
            TracingObserver::for_dynamics(&dynamics, settings.generation_reports),
            SupportSummary::for_dynamics(&dynamics),
        ),
        GenerationCap::new(settings.max_generations),
    );
    GenerationMachine::new(dynamics).run(initial, &mut observers)
}

/// Run duplicate `index` of `game`.
fn run_once(index: u32, game: &PreparedGame, settings: &RunSettings) -> Result<RunRecord, MachineError> {
    let _span = info_span!("run", run = index).entered();
    let config = settings.dynamics_for(index);
    let experiment = settings.experiment.clone();

    match game {
        PreparedGame::OnePopulation {
            types,
            interaction_arity,
            game,
            initial,
        } => {
            let game = Arc::clone(game);
            let payoff = move |profile: &[usize]| game.payoffs(profile);
            let dynamics = OnePopulation::new(types.clone(), *interaction_arity, config, payoff);
            let result = execute(dynamics, initial.clone(), settings)?;
            Ok(RunRecord::from_result(experiment, index, result))
        }
        PreparedGame::TwoPopulations {
            types,
            game,
            initial,
        } => {
            let game = Arc::clone(game);
            let payoff = move |profile: &[usize]| game.payoffs(profile);
            let dynamics = ManyPopulations::new(types.clone(), config, payoff);
            let result = execute(dynamics, initial.clone(), settings)?;
            Ok(RunRecord::from_result(experiment, index, result))
        }
    }
}

/// Run every duplicate of `config` and write one JSON line per successful
/// run to `sink`, in completion order.
///
/// # Errors
///
/// Returns [`EngineError`] if the configuration is invalid or output
/// fails. Failed runs do not abort the batch; they are logged and counted
/// in the returned summary.
pub async fn run_batch(
    config: &ExperimentConfig,
    sink: &mut dyn Write,
) -> Result<BatchSummary, EngineError> {
    config.validate()?;
    let game = Arc::new(PreparedGame::from_config(&config.game)?);
    let settings = Arc::new(RunSettings::from_config(config));
    let total = config.experiment.duplicates;

    info!(
        experiment = settings.experiment,
        game = config.game.kind(),
        duplicates = total,
        max_generations = settings.max_generations,
        "Batch starting"
    );

    let mut tasks = JoinSet::new();
    for index in 0..total {
        let game = Arc::clone(&game);
        let settings = Arc::clone(&settings);
        tasks.spawn_blocking(move || (index, run_once(index, &game, &settings)));
    }

    let mut summary = BatchSummary {
        total,
        ..BatchSummary::default()
    };
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(record))) => {
                summary.record(&record);
                serde_json::to_writer(&mut *sink, &record)?;
                writeln!(sink)?;
            }
            Ok((index, Err(err))) => {
                error!(run = index, error = %err, "Run failed");
                summary.failed = summary.failed.saturating_add(1);
            }
            Err(err) => {
                error!(error = %err, "Run task panicked or was cancelled");
                summary.failed = summary.failed.saturating_add(1);
            }
        }
    }
    sink.flush()?;

    info!(
        total = summary.total,
        stable = summary.stable,
        forced = summary.forced,
        failed = summary.failed,
        mean_generations = summary.mean_generations(),
        "Batch finished"
    );

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ExperimentConfig {
        ExperimentConfig::parse(yaml).unwrap()
    }

    fn lines(output: &[u8]) -> Vec<serde_json::Value> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn default_config_runs_one_stable_pd() {
        let mut output = Vec::new();
        let summary = run_batch(&ExperimentConfig::default(), &mut output).await.unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.stable, 1);
        assert_eq!(summary.failed, 0);
        let records = lines(&output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["outcome"], "stable");
        assert_eq!(records[0]["result_data"]["support"][0][0]["label"], "D");
    }

    #[tokio::test]
    async fn duplicates_run_in_parallel_with_distinct_seeds() {
        let config = parse(
            "experiment:\n  name: dup\n  duplicates: 6\ndynamics:\n  seed: 1\n",
        );
        let mut output = Vec::new();
        let summary = run_batch(&config, &mut output).await.unwrap();

        assert_eq!(summary.stable, 6);
        let records = lines(&output);
        let mut runs: Vec<u64> = records.iter().map(|r| r["run"].as_u64().unwrap()).collect();
        runs.sort_unstable();
        assert_eq!(runs, vec![0, 1, 2, 3, 4, 5]);
        let first = records.iter().find(|r| r["run"] == 0).unwrap();
        let second = records.iter().find(|r| r["run"] == 1).unwrap();
        assert_ne!(first["initial"], second["initial"]);
        assert!(records.iter().all(|r| r["experiment"] == "dup"));
    }

    #[tokio::test]
    async fn generation_cap_forces_stop() {
        let config = parse(
            "experiment:\n  max_generations: 2\ngame:\n  kind: one_population\n  types: [C, D]\n  initial_population: [0.9999, 0.0001]\n",
        );
        let mut output = Vec::new();
        let summary = run_batch(&config, &mut output).await.unwrap();

        assert_eq!(summary.forced, 1);
        assert_eq!(summary.total_generations, 2);
        assert_eq!(summary.mean_generations(), 2.0);
        assert_eq!(lines(&output)[0]["outcome"], "forced_stop");
    }

    #[tokio::test]
    async fn two_populations_from_yaml() {
        let config = parse(
            "game:\n  kind: two_populations\n  initial_population: [[0.5, 0.5], [0.3, 0.7]]\n",
        );
        let mut output = Vec::new();
        let summary = run_batch(&config, &mut output).await.unwrap();

        assert_eq!(summary.stable, 1);
        let record = &lines(&output)[0];
        assert_eq!(record["initial"][1], serde_json::json!([0.3, 0.7]));
        assert_eq!(record["final_population"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_runs_are_counted_not_fatal() {
        let config = parse(
            "experiment:\n  duplicates: 3\ngame:\n  kind: one_population\n  payoffs: [[0, 0], [0, 0]]\n",
        );
        let mut output = Vec::new();
        let summary = run_batch(&config, &mut output).await.unwrap();

        assert_eq!(summary.failed, 3);
        assert_eq!(summary.mean_generations(), 0.0);
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn malformed_tables_fail_the_batch() {
        let config = parse("game:\n  kind: one_population\n  payoffs: [[1, 2, 3]]\n");
        let err = run_batch(&config, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::Game { .. }));

        let config = parse("game:\n  kind: one_population\n  initial_population: [0.5, 0.6]\n");
        let err = run_batch(&config, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::InitialPopulation { .. }));

        let config = parse("experiment:\n  duplicates: 0\n");
        let err = run_batch(&config, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
    }

    #[tokio::test]
    async fn type_count_must_match_table() {
        for types in ["[C]", "[A, B, C]"] {
            let config = parse(&format!(
                "experiment:\n  duplicates: 3\ngame:\n  kind: one_population\n  types: {types}\n  payoffs: [[3, 0], [4, 1]]\n"
            ));
            let mut output = Vec::new();
            let err = run_batch(&config, &mut output).await.unwrap_err();
            assert!(matches!(err, EngineError::Config { .. }), "{types}: {err}");
            assert!(output.is_empty());
        }
    }

    #[tokio::test]
    async fn two_population_shape_must_match_tables() {
        let config = parse(
            "game:\n  kind: two_populations\n  types: [[A, B], [C, D, E]]\n  row_payoffs: [[3, 0], [4, 1]]\n",
        );
        let err = run_batch(&config, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }), "{err}");

        let config = parse(
            "game:\n  kind: two_populations\n  types: [[A, B], [C, D, E]]\n  row_payoffs: [[1, 2, 3], [4, 5, 6]]\n  column_payoffs: [[6, 5, 4], [3, 2, 1]]\n",
        );
        let summary = run_batch(&config, &mut Vec::new()).await.unwrap();
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn unsupported_arity_fails_the_batch() {
        let config = parse("experiment:\n  duplicates: 2\ngame:\n  kind: one_population\n  interaction_arity: 3\n");
        let err = run_batch(&config, &mut Vec::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::Config { .. }));
    }
}
