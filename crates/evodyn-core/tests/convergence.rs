//! End-to-end runs of the generation machine on small games.
//!
//! These drive both specializations through the public API only: build a
//! game, wrap it in dynamics, run a machine, inspect the result.

#![allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]

use std::sync::atomic::{AtomicUsize, Ordering};

use evodyn_core::{
    BimatrixGame, CacheError, CompensatedKernel, Dynamics, DynamicsConfig, GenerationCap,
    GenerationMachine, GenerationObserver, MachineError, MachineState, ManyPopulations,
    NoOpObserver, OnePopulation, PaddedFrequencies, PayoffCache, PayoffFunction, PerPlayer,
    RunControl, StepError, StepKernel, SupportSummary, SymmetricMatrixGame, TerminalReport,
    TracingObserver,
};
use evodyn_types::{PopulationSet, RunOutcome, Simplex, TypeSet};
use serde_json::json;

const EFFECTIVE_ZERO: f64 = 1e-10;

fn pd_table() -> Vec<Vec<f64>> {
    vec![vec![3.0, 0.0], vec![4.0, 1.0]]
}

fn cd() -> TypeSet {
    ["C", "D"].into_iter().collect()
}

fn pd_dynamics() -> OnePopulation<SymmetricMatrixGame> {
    let game = SymmetricMatrixGame::new(&pd_table()).unwrap();
    OnePopulation::new(cd(), 2, DynamicsConfig::default(), game)
}

fn seeded(seed: u64) -> DynamicsConfig {
    DynamicsConfig {
        seed: Some(seed),
        ..DynamicsConfig::default()
    }
}

/// Raises `force_stop` once the given generation has been stepped.
struct StopAt(u64);

impl<P> GenerationObserver<P> for StopAt {
    fn on_generation(&mut self, generation: u64, _: &P, _: &P, control: &mut RunControl) {
        if generation >= self.0 {
            control.force_stop = true;
        }
    }
}

/// Counts generation notifications.
#[derive(Default)]
struct Generations(u64);

impl<P> GenerationObserver<P> for Generations {
    fn on_generation(&mut self, _: u64, _: &P, _: &P, _: &mut RunControl) {
        self.0 = self.0.saturating_add(1);
    }
}

#[test]
fn pd_converges_to_defect_from_near_all_defect() {
    let mut machine = GenerationMachine::new(pd_dynamics());
    let initial = Simplex::new(vec![0.01, 0.99]).unwrap();
    let result = machine.run(Some(initial.clone()), &mut NoOpObserver).unwrap();

    assert_eq!(result.outcome, RunOutcome::Stable);
    assert!(result.generation_count >= 1);
    assert_eq!(result.initial, initial);
    assert!(result.final_population.approx_eq(&Simplex::vertex(2, 1), 1e-9));
    assert!(
        result
            .final_population
            .approx_eq(&result.previous, EFFECTIVE_ZERO)
    );
}

#[test]
fn pd_converges_to_defect_from_near_all_cooperate() {
    let mut machine = GenerationMachine::new(pd_dynamics());
    let initial = Simplex::new(vec![1.0 - 5e-10, 5e-10]).unwrap();
    let result = machine.run(Some(initial), &mut NoOpObserver).unwrap();

    assert_eq!(result.outcome, RunOutcome::Stable);
    assert!(result.generation_count > 1);
    assert!(result.final_population.approx_eq(&Simplex::vertex(2, 1), 1e-9));
}

#[test]
fn pd_converges_from_random_starts() {
    for seed in 0..5 {
        let game = SymmetricMatrixGame::new(&pd_table()).unwrap();
        let mut machine = GenerationMachine::new(OnePopulation::new(cd(), 2, seeded(seed), game));
        let result = machine.run(None, &mut NoOpObserver).unwrap();
        assert!(result.is_stable());
        assert!(result.final_population.approx_eq(&Simplex::vertex(2, 1), 1e-9));
    }
}

#[test]
fn force_stop_on_generation_one() {
    let mut machine = GenerationMachine::new(pd_dynamics());
    let initial = Simplex::new(vec![0.5, 0.5]).unwrap();
    let result = machine.run(Some(initial), &mut StopAt(1)).unwrap();

    assert_eq!(result.generation_count, 1);
    assert_eq!(result.outcome, RunOutcome::ForcedStop);
    assert_eq!(machine.state(), MachineState::ForcedStop);
    // Progress of the step that raised the flag is kept.
    assert!(result.final_population.approx_eq(&Simplex::from_raw(vec![0.375, 0.625]), 1e-15));
}

#[test]
fn generation_cap_force_stops_a_slow_run() {
    let mut machine = GenerationMachine::new(pd_dynamics());
    let initial = Simplex::new(vec![1.0 - 5e-10, 5e-10]).unwrap();
    let mut observers = (GenerationCap::new(3), Generations::default());
    let result = machine.run(Some(initial), &mut observers).unwrap();

    assert_eq!(result.generation_count, 3);
    assert_eq!(observers.1.0, 3);
    assert_eq!(result.outcome, RunOutcome::ForcedStop);
}

#[test]
fn payoff_function_is_called_once_per_profile() {
    let calls = AtomicUsize::new(0);
    let game = SymmetricMatrixGame::new(&pd_table()).unwrap();
    let counted = |profile: &[usize]| {
        calls.fetch_add(1, Ordering::Relaxed);
        game.payoffs(profile)
    };
    let mut machine =
        GenerationMachine::new(OnePopulation::new(cd(), 2, DynamicsConfig::default(), counted));
    let mut generations = Generations::default();
    let result = machine
        .run(Some(Simplex::new(vec![1.0 - 5e-10, 5e-10]).unwrap()), &mut generations)
        .unwrap();

    assert!(result.generation_count > 10);
    assert_eq!(generations.0, result.generation_count);
    assert_eq!(calls.load(Ordering::Relaxed), 4);
}

#[test]
fn two_population_pd_converges_both_to_defect() {
    let game = BimatrixGame::symmetric(&pd_table()).unwrap();
    let types = vec![
        ["A", "B"].into_iter().collect(),
        ["C", "D"].into_iter().collect(),
    ];
    let mut machine = GenerationMachine::new(ManyPopulations::new(types, seeded(21), game));
    let result = machine.run(None, &mut NoOpObserver).unwrap();

    assert!(result.is_stable());
    let defect = PopulationSet::new(vec![Simplex::vertex(2, 1), Simplex::vertex(2, 1)]);
    assert!(result.final_population.approx_eq(&defect, 1e-9));
}

#[test]
fn three_populations_with_mixed_dimensions() {
    // Population k is paid 1 for matching the type of population k+1.
    let payoff = PerPlayer(|place: usize, profile: &[usize]| {
        let next = profile[(place + 1) % profile.len()];
        if profile[place] == next { 1.0 } else { 0.0 }
    });
    let types: Vec<TypeSet> = vec![
        ["A", "B"].into_iter().collect(),
        ["A", "B", "C"].into_iter().collect(),
        ["A", "B"].into_iter().collect(),
    ];
    let config = DynamicsConfig {
        background_rate: 1.0,
        ..seeded(5)
    };
    let mut machine = GenerationMachine::new(ManyPopulations::new(types, config, payoff));
    let mut observers = (GenerationCap::new(10_000), NoOpObserver);
    let result = machine.run(None, &mut observers).unwrap();

    assert_eq!(result.final_population.len(), 3);
    assert_eq!(result.final_population.get(1).unwrap().dimension(), 3);
    for simplex in &result.final_population {
        assert!((simplex.total() - 1.0).abs() <= EFFECTIVE_ZERO);
        assert!(simplex.values().iter().all(|&x| x >= 0.0));
    }
}

#[test]
fn zero_denominator_is_not_a_terminal_result() {
    let zero = |profile: &[usize]| vec![0.0; profile.len()];
    let mut machine =
        GenerationMachine::new(OnePopulation::new(cd(), 2, DynamicsConfig::default(), zero));
    let err = machine
        .run(Some(Simplex::new(vec![0.5, 0.5]).unwrap()), &mut NoOpObserver)
        .unwrap_err();

    assert!(matches!(
        err,
        MachineError::Step {
            source: StepError::ZeroDenominator { .. },
            ..
        }
    ));
    assert_eq!(machine.state(), MachineState::Failed);
}

#[test]
fn background_rate_guards_degenerate_payoffs() {
    let zero = |profile: &[usize]| vec![0.0; profile.len()];
    let config = DynamicsConfig {
        background_rate: 1.0,
        ..DynamicsConfig::default()
    };
    let mut machine = GenerationMachine::new(OnePopulation::new(cd(), 2, config, zero));
    let initial = Simplex::new(vec![0.25, 0.75]).unwrap();
    let result = machine.run(Some(initial.clone()), &mut NoOpObserver).unwrap();

    assert_eq!(result.generation_count, 1);
    assert_eq!(result.final_population, initial);
}

#[test]
fn configuration_errors_surface_before_any_generation() {
    let game = SymmetricMatrixGame::new(&pd_table()).unwrap();
    let mut machine =
        GenerationMachine::new(OnePopulation::new(cd(), 3, DynamicsConfig::default(), game));
    let mut generations = Generations::default();
    let err = machine.run(None, &mut generations).unwrap_err();

    assert!(err.is_config());
    assert!(matches!(
        err,
        MachineError::Cache {
            source: CacheError::PayoffLength { .. }
        }
    ));
    assert_eq!(generations.0, 0);

    let game = SymmetricMatrixGame::new(&pd_table()).unwrap();
    let empty = TypeSet::new(Vec::new());
    let mut machine =
        GenerationMachine::new(OnePopulation::new(empty, 2, DynamicsConfig::default(), game));
    let err = machine.run(None, &mut NoOpObserver).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn listeners_attach_result_data() {
    struct Tag;
    impl GenerationObserver<Simplex> for Tag {
        fn on_stable_state(&mut self, report: &TerminalReport<'_, Simplex>, control: &mut RunControl) {
            control.result_data = Some(json!({ "generations": report.generation_count }));
        }
    }

    let mut machine = GenerationMachine::new(pd_dynamics());
    let result = machine
        .run(Some(Simplex::vertex(2, 1)), &mut Tag)
        .unwrap();
    let (count, _, _, data) = result.into_tuple();
    assert_eq!(count, 1);
    assert_eq!(data, Some(json!({ "generations": 1 })));
}

#[test]
fn support_summary_and_tracing_compose() {
    let dynamics = pd_dynamics();
    let mut observers = (
        TracingObserver::for_dynamics(&dynamics, true),
        SupportSummary::for_dynamics(&dynamics),
    );
    let mut machine = GenerationMachine::new(dynamics);
    let result = machine
        .run(Some(Simplex::new(vec![0.01, 0.99]).unwrap()), &mut observers)
        .unwrap();

    assert_eq!(
        result.result_data,
        Some(json!({ "support": [[{ "index": 1, "label": "D", "frequency": result.final_population.get(1) }]] }))
    );
}

#[test]
fn step_preserves_the_simplex() {
    let game = SymmetricMatrixGame::new(&[
        vec![0.0, -1.0, 1.0],
        vec![1.0, 0.0, -1.0],
        vec![-1.0, 1.0, 0.0],
    ])
    .unwrap();
    let types: TypeSet = ["R", "P", "S"].into_iter().collect();
    let config = DynamicsConfig {
        background_rate: 2.0,
        ..seeded(9)
    };
    let mut dynamics = OnePopulation::new(types, 2, config, game);
    dynamics.build_cache().unwrap();

    let mut population = dynamics.random_population();
    for _ in 0..50 {
        assert!((population.total() - 1.0).abs() <= EFFECTIVE_ZERO);
        population = dynamics.step(&population).unwrap();
        assert!(population.values().iter().all(|&x| x >= 0.0));
    }
}

#[test]
fn fixed_points_are_idempotent() {
    let mut dynamics = pd_dynamics();
    dynamics.build_cache().unwrap();
    for fixed in [Simplex::vertex(2, 0), Simplex::vertex(2, 1)] {
        let next = dynamics.step(&fixed).unwrap();
        assert!(dynamics.populations_equal(&fixed, &next));
    }
}

/// Delegates to the default kernel and counts steps.
#[derive(Default)]
struct CountingKernel {
    steps: AtomicUsize,
}

impl StepKernel for CountingKernel {
    fn step_one(
        &self,
        frequencies: &[f64],
        cache: &PayoffCache,
        background_rate: f64,
    ) -> Result<Vec<f64>, StepError> {
        self.steps.fetch_add(1, Ordering::Relaxed);
        CompensatedKernel.step_one(frequencies, cache, background_rate)
    }

    fn step_many(
        &self,
        frequencies: &PaddedFrequencies,
        cache: &PayoffCache,
        background_rate: f64,
    ) -> Result<PaddedFrequencies, StepError> {
        self.steps.fetch_add(1, Ordering::Relaxed);
        CompensatedKernel.step_many(frequencies, cache, background_rate)
    }
}

#[test]
fn kernel_can_be_swapped() {
    let dynamics = pd_dynamics().with_kernel(CountingKernel::default());
    let mut machine = GenerationMachine::new(dynamics);
    let result = machine
        .run(Some(Simplex::new(vec![0.01, 0.99]).unwrap()), &mut NoOpObserver)
        .unwrap();
    let steps = machine.into_dynamics();
    assert!(result.is_stable());
    assert_eq!(
        u64::try_from(steps.kernel().steps.load(Ordering::Relaxed)).unwrap(),
        result.generation_count
    );
}
