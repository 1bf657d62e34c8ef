use serde::Serialize;
use std::time::Duration;

use crate::state::RunState;

/// The final outcome of a run
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The critic accepted the code
    Accepted {
        state: RunState,
        steps: usize,
        total_duration_secs: f64,
    },
    /// The attempt budget ran out before the critic accepted
    BudgetExhausted {
        state: RunState,
        steps: usize,
        total_duration_secs: f64,
    },
    /// User requested stop (e.g., Ctrl+C)
    Interrupted {
        state: RunState,
        steps: usize,
        total_duration_secs: f64,
    },
}

impl RunOutcome {
    /// Classify a run that reached the terminal stage
    pub fn finished(state: RunState, steps: usize, duration: Duration) -> Self {
        if state.is_accepted() {
            Self::Accepted {
                state,
                steps,
                total_duration_secs: duration.as_secs_f64(),
            }
        } else {
            Self::BudgetExhausted {
                state,
                steps,
                total_duration_secs: duration.as_secs_f64(),
            }
        }
    }

    pub fn interrupted(state: RunState, steps: usize, duration: Duration) -> Self {
        Self::Interrupted {
            state,
            steps,
            total_duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn state(&self) -> &RunState {
        match self {
            Self::Accepted { state, .. }
            | Self::BudgetExhausted { state, .. }
            | Self::Interrupted { state, .. } => state,
        }
    }

    pub fn steps(&self) -> usize {
        match self {
            Self::Accepted { steps, .. }
            | Self::BudgetExhausted { steps, .. }
            | Self::Interrupted { steps, .. } => *steps,
        }
    }

    pub fn total_duration_secs(&self) -> f64 {
        match self {
            Self::Accepted {
                total_duration_secs,
                ..
            }
            | Self::BudgetExhausted {
                total_duration_secs,
                ..
            }
            | Self::Interrupted {
                total_duration_secs,
                ..
            } => *total_duration_secs,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "accepted",
            Self::BudgetExhausted { .. } => "budget_exhausted",
            Self::Interrupted { .. } => "interrupted",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Accepted { .. } => 0,
            Self::BudgetExhausted { .. } => 1,
            Self::Interrupted { .. } => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RunMode, StatePatch};
    use forgeloop_critic::CriticDecision;

    #[test]
    fn test_finished_classification_and_exit_codes() {
        let accepted = RunState::new("x", RunMode::Standard).apply(StatePatch {
            critic_decision: Some(Some(CriticDecision::Works)),
            ..Default::default()
        });
        let outcome = RunOutcome::finished(accepted, 7, Duration::from_secs(1));
        assert!(outcome.is_accepted());
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.steps(), 7);

        let rejected = RunState::new("x", RunMode::Standard).apply(StatePatch {
            critic_decision: Some(Some(CriticDecision::Rethink)),
            ..Default::default()
        });
        let outcome = RunOutcome::finished(rejected, 12, Duration::from_secs(1));
        assert_eq!(outcome.label(), "budget_exhausted");
        assert_eq!(outcome.exit_code(), 1);

        let outcome = RunOutcome::interrupted(
            RunState::new("x", RunMode::Standard),
            0,
            Duration::ZERO,
        );
        assert_eq!(outcome.exit_code(), 130);
    }

    #[test]
    fn test_serializes_with_outcome_tag() {
        let outcome = RunOutcome::interrupted(
            RunState::new("x", RunMode::Standard),
            2,
            Duration::from_millis(1500),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "interrupted");
        assert_eq!(value["steps"], 2);
        assert_eq!(value["state"]["request"], "x");
        assert_eq!(value["total_duration_secs"], 1.5);
    }
}
