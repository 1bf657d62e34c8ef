//! Pure routing between stages.
//!
//! These functions are the only place the loop decides whether to continue.
//! They look at the state after Execute, Critique or Summarize and nothing else.

use forgeloop_critic::CriticDecision;
use forgeloop_sandbox::ExecStatus;
use serde::{Deserialize, Serialize};

use crate::state::{RunMode, RunState};

/// A node of the run graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Generate,
    Execute,
    Critique,
    Summarize,
    Teach,
    Terminated,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Plan => "plan",
            Stage::Generate => "generate",
            Stage::Execute => "execute",
            Stage::Critique => "critique",
            Stage::Summarize => "summarize",
            Stage::Teach => "teach",
            Stage::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// After Execute: retry on failure while budget remains, otherwise critique.
pub fn route_after_execute(state: &RunState, max_iterations: usize) -> Stage {
    if state.iterations >= max_iterations || state.status == Some(ExecStatus::Works) {
        Stage::Critique
    } else {
        Stage::Generate
    }
}

/// After Critique: rework on rejection while budget remains, otherwise summarize.
pub fn route_after_critique(state: &RunState, max_iterations: usize) -> Stage {
    if state.iterations >= max_iterations || state.critic_decision == Some(CriticDecision::Works)
    {
        Stage::Summarize
    } else {
        Stage::Generate
    }
}

/// After Summarize: teach only in extended mode with a tutor available.
pub fn route_after_summary(state: &RunState, has_tutor: bool) -> Stage {
    if state.mode == RunMode::Extended && has_tutor {
        Stage::Teach
    } else {
        Stage::Terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatePatch;

    const MAX: usize = 3;

    fn state(
        status: Option<ExecStatus>,
        decision: Option<CriticDecision>,
        iterations: usize,
    ) -> RunState {
        RunState::new("x", RunMode::Standard).apply(StatePatch {
            status: Some(status),
            critic_decision: Some(decision),
            iterations: Some(iterations),
            ..Default::default()
        })
    }

    const STATUSES: [Option<ExecStatus>; 3] =
        [None, Some(ExecStatus::Works), Some(ExecStatus::Error)];
    const DECISIONS: [Option<CriticDecision>; 3] = [
        None,
        Some(CriticDecision::Works),
        Some(CriticDecision::Rethink),
    ];

    #[test]
    fn test_after_execute_is_total_and_deterministic() {
        for status in STATUSES {
            for decision in DECISIONS {
                for iterations in 0..=MAX + 2 {
                    let s = state(status, decision, iterations);
                    let expected = if iterations >= MAX || status == Some(ExecStatus::Works) {
                        Stage::Critique
                    } else {
                        Stage::Generate
                    };
                    assert_eq!(route_after_execute(&s, MAX), expected);
                    assert_eq!(route_after_execute(&s, MAX), route_after_execute(&s, MAX));
                }
            }
        }
    }

    #[test]
    fn test_after_critique_is_total_and_deterministic() {
        for status in STATUSES {
            for decision in DECISIONS {
                for iterations in 0..=MAX + 2 {
                    let s = state(status, decision, iterations);
                    let expected =
                        if iterations >= MAX || decision == Some(CriticDecision::Works) {
                            Stage::Summarize
                        } else {
                            Stage::Generate
                        };
                    assert_eq!(route_after_critique(&s, MAX), expected);
                }
            }
        }
    }

    #[test]
    fn test_failed_execution_at_budget_still_reaches_critique() {
        let s = state(Some(ExecStatus::Error), None, MAX);
        assert_eq!(route_after_execute(&s, MAX), Stage::Critique);
    }

    #[test]
    fn test_rejection_below_budget_loops_back() {
        let s = state(Some(ExecStatus::Works), Some(CriticDecision::Rethink), 1);
        assert_eq!(route_after_critique(&s, MAX), Stage::Generate);
    }

    #[test]
    fn test_after_summary() {
        let standard = RunState::new("x", RunMode::Standard);
        let extended = RunState::new("x", RunMode::Extended);
        assert_eq!(route_after_summary(&standard, true), Stage::Terminated);
        assert_eq!(route_after_summary(&extended, false), Stage::Terminated);
        assert_eq!(route_after_summary(&extended, true), Stage::Teach);
    }
}
