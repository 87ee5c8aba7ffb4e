//! Terminal outcomes and run results.

use serde::{Deserialize, Serialize};

/// How a run left the stepping loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Two consecutive generations were equal within the effective zero.
    Stable,
    /// A listener raised the force-stop flag.
    ForcedStop,
}

impl RunOutcome {
    /// Short human-readable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::ForcedStop => "forced_stop",
        }
    }
}

impl core::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one completed run.
///
/// Holds the classic `(generation_count, initial, final, result_data)`
/// tuple plus the previous generation and how the run terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult<P> {
    /// Number of generations stepped.
    pub generation_count: u64,
    /// The population the run started from.
    pub initial: P,
    /// The last generation computed.
    pub final_population: P,
    /// The generation before the last one (the null sentinel if no step ran).
    pub previous: P,
    /// Whether the run reached a stable state or was forced to stop.
    pub outcome: RunOutcome,
    /// Optional payload attached by listeners during the run.
    pub result_data: Option<serde_json::Value>,
}

impl<P> RunResult<P> {
    /// Whether the run ended in a stable state.
    pub fn is_stable(&self) -> bool {
        self.outcome == RunOutcome::Stable
    }

    /// Split into the `(generation_count, initial, final, result_data)` tuple.
    pub fn into_tuple(self) -> (u64, P, P, Option<serde_json::Value>) {
        (
            self.generation_count,
            self.initial,
            self.final_population,
            self.result_data,
        )
    }
}
