//! Lifecycle notifications from the generation machine.
//!
//! Observers are passed into [`crate::GenerationMachine::run`] and called
//! synchronously at every transition. They cannot change the populations;
//! the only things they can affect are the fields of [`RunControl`].

/// The listener-mutable part of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunControl {
    /// Stop after the current generation. Checked once per generation.
    pub force_stop: bool,

    /// Arbitrary payload attached to the run result.
    pub result_data: Option<serde_json::Value>,
}

/// Everything known about a run when it reaches a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct TerminalReport<'a, P> {
    /// Generations stepped.
    pub generation_count: u64,
    /// Population after the last step.
    pub final_population: &'a P,
    /// Population before the last step.
    pub previous: &'a P,
    /// Population the run started from.
    pub initial: &'a P,
}

/// Receives lifecycle notifications. Every method defaults to doing nothing.
pub trait GenerationObserver<P> {
    /// The initial population has been drawn or accepted.
    fn on_initial_set(&mut self, _initial: &P, _control: &mut RunControl) {}

    /// A generation has been stepped.
    fn on_generation(
        &mut self,
        _generation: u64,
        _current: &P,
        _previous: &P,
        _control: &mut RunControl,
    ) {
    }

    /// Two consecutive generations were equal within tolerance.
    fn on_stable_state(&mut self, _report: &TerminalReport<'_, P>, _control: &mut RunControl) {}

    /// The run ended because `force_stop` was set.
    fn on_force_stop(&mut self, _report: &TerminalReport<'_, P>, _control: &mut RunControl) {}
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl<P> GenerationObserver<P> for NoOpObserver {}

impl<P, O: GenerationObserver<P> + ?Sized> GenerationObserver<P> for &mut O {
    fn on_initial_set(&mut self, initial: &P, control: &mut RunControl) {
        (**self).on_initial_set(initial, control);
    }

    fn on_generation(&mut self, generation: u64, current: &P, previous: &P, control: &mut RunControl) {
        (**self).on_generation(generation, current, previous, control);
    }

    fn on_stable_state(&mut self, report: &TerminalReport<'_, P>, control: &mut RunControl) {
        (**self).on_stable_state(report, control);
    }

    fn on_force_stop(&mut self, report: &TerminalReport<'_, P>, control: &mut RunControl) {
        (**self).on_force_stop(report, control);
    }
}

/// Both observers, first `A` then `B`.
impl<P, A: GenerationObserver<P>, B: GenerationObserver<P>> GenerationObserver<P> for (A, B) {
    fn on_initial_set(&mut self, initial: &P, control: &mut RunControl) {
        self.0.on_initial_set(initial, control);
        self.1.on_initial_set(initial, control);
    }

    fn on_generation(&mut self, generation: u64, current: &P, previous: &P, control: &mut RunControl) {
        self.0.on_generation(generation, current, previous, control);
        self.1.on_generation(generation, current, previous, control);
    }

    fn on_stable_state(&mut self, report: &TerminalReport<'_, P>, control: &mut RunControl) {
        self.0.on_stable_state(report, control);
        self.1.on_stable_state(report, control);
    }

    fn on_force_stop(&mut self, report: &TerminalReport<'_, P>, control: &mut RunControl) {
        self.0.on_force_stop(report, control);
        self.1.on_force_stop(report, control);
    }
}
