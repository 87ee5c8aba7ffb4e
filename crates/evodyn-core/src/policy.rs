//! Termination policies built on the force-stop flag.

use tracing::debug;

use crate::observer::{GenerationObserver, RunControl};

/// Force-stops a run once it has stepped `max_generations` generations.
///
/// A cap of 0 means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationCap {
    max_generations: u64,
}

impl GenerationCap {
    /// Cap at `max_generations`; 0 disables the cap.
    pub const fn new(max_generations: u64) -> Self {
        Self { max_generations }
    }

    /// The configured cap.
    pub const fn max_generations(&self) -> u64 {
        self.max_generations
    }

    /// Returns `true` if `max_generations > 0` and `generation >= max_generations`.
    pub const fn limit_reached(&self, generation: u64) -> bool {
        self.max_generations > 0 && generation >= self.max_generations
    }
}

impl<P> GenerationObserver<P> for GenerationCap {
    fn on_generation(&mut self, generation: u64, _current: &P, _previous: &P, control: &mut RunControl) {
        if self.limit_reached(generation) && !control.force_stop {
            debug!(generation, max_generations = self.max_generations, "Generation cap reached");
            control.force_stop = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_unlimited() {
        assert!(!GenerationCap::new(0).limit_reached(999_999));
    }

    #[test]
    fn limit_reached_at_cap() {
        let cap = GenerationCap::new(100);
        assert!(!cap.limit_reached(99));
        assert!(cap.limit_reached(100));
        assert!(cap.limit_reached(101));
    }

    #[test]
    fn sets_force_stop() {
        let mut cap = GenerationCap::new(2);
        let mut control = RunControl::default();
        cap.on_generation(1, &(), &(), &mut control);
        assert!(!control.force_stop);
        cap.on_generation(2, &(), &(), &mut control);
        assert!(control.force_stop);
    }
}
