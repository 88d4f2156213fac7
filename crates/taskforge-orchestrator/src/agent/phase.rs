//! Task lifecycle phases.

use std::fmt;

/// Phase of one task's execution lifecycle.
///
/// `Start -> ContextRetrieval -> ModelSelection -> PlanGeneration ->
/// Execution -> MetricsRecord -> Done`, with `FallbackSearch` entered when
/// plan generation fails and `Error` absorbing a failure from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Start,
    ContextRetrieval,
    ModelSelection,
    PlanGeneration,
    FallbackSearch,
    Execution,
    MetricsRecord,
    Done,
    Error,
}

impl TaskPhase {
    /// Whether the lifecycle has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::ContextRetrieval => "context_retrieval",
            Self::ModelSelection => "model_selection",
            Self::PlanGeneration => "plan_generation",
            Self::FallbackSearch => "fallback_search",
            Self::Execution => "execution",
            Self::MetricsRecord => "metrics_record",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(TaskPhase::Done.is_terminal());
        assert!(TaskPhase::Error.is_terminal());
        assert!(!TaskPhase::Execution.is_terminal());
    }
}
