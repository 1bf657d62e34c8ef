use forgeloop_critic::CriticDecision;
use forgeloop_sandbox::ExecStatus;
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::routing::Stage;

/// Whether the run ends after the summary or adds a lesson
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Standard,
    Extended,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Standard => write!(f, "standard"),
            RunMode::Extended => write!(f, "extended"),
        }
    }
}

/// The single record threaded through every stage of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Original request, never changed after creation
    pub request: String,
    pub plan: Option<String>,
    /// Latest generated artifact, prose and fenced block included
    pub coding: Option<String>,
    /// Tag of the block the latest execution ran
    pub language: Option<String>,
    /// Latest execution outcome, labelled by stream
    pub result: Option<String>,
    pub status: Option<ExecStatus>,
    pub critic_decision: Option<CriticDecision>,
    pub critic_explanation: Option<String>,
    /// Code-generation attempts since the plan was written
    pub iterations: usize,
    pub summary: Option<String>,
    pub lesson: Option<String>,
    pub mode: RunMode,
}

impl RunState {
    pub fn new(request: impl Into<String>, mode: RunMode) -> Self {
        Self {
            request: request.into(),
            plan: None,
            coding: None,
            language: None,
            result: None,
            status: None,
            critic_decision: None,
            critic_explanation: None,
            iterations: 0,
            summary: None,
            lesson: None,
            mode,
        }
    }

    /// Produce the next state from a stage's patch.
    pub fn apply(mut self, patch: StatePatch) -> Self {
        if let Some(plan) = patch.plan {
            self.plan = Some(plan);
        }
        if let Some(coding) = patch.coding {
            self.coding = Some(coding);
        }
        if let Some(language) = patch.language {
            self.language = language;
        }
        if let Some(result) = patch.result {
            self.result = Some(result);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(decision) = patch.critic_decision {
            self.critic_decision = decision;
        }
        if let Some(explanation) = patch.critic_explanation {
            self.critic_explanation = explanation;
        }
        if let Some(iterations) = patch.iterations {
            self.iterations = iterations;
        }
        if let Some(summary) = patch.summary {
            self.summary = Some(summary);
        }
        if let Some(lesson) = patch.lesson {
            self.lesson = Some(lesson);
        }
        self
    }

    pub fn is_accepted(&self) -> bool {
        self.critic_decision == Some(CriticDecision::Works)
    }

    pub fn require_plan(&self, stage: Stage) -> Result<&str, RunError> {
        require(&self.plan, stage, "plan")
    }

    pub fn require_coding(&self, stage: Stage) -> Result<&str, RunError> {
        require(&self.coding, stage, "coding")
    }

    pub fn require_result(&self, stage: Stage) -> Result<&str, RunError> {
        require(&self.result, stage, "result")
    }

    pub fn require_critic_explanation(&self, stage: Stage) -> Result<&str, RunError> {
        require(&self.critic_explanation, stage, "critic_explanation")
    }
}

fn require<'a>(
    value: &'a Option<String>,
    stage: Stage,
    field: &'static str,
) -> Result<&'a str, RunError> {
    value
        .as_deref()
        .ok_or(RunError::MissingStateField { stage, field })
}

/// Fields a stage wants changed.
///
/// `None` leaves a field alone. For the fields that can be reset, the inner
/// `Option` is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub plan: Option<String>,
    pub coding: Option<String>,
    pub language: Option<Option<String>>,
    pub result: Option<String>,
    pub status: Option<Option<ExecStatus>>,
    pub critic_decision: Option<Option<CriticDecision>>,
    pub critic_explanation: Option<Option<String>>,
    pub iterations: Option<usize>,
    pub summary: Option<String>,
    pub lesson: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_blank() {
        let state = RunState::new("reverse a string", RunMode::Standard);
        assert_eq!(state.request, "reverse a string");
        assert_eq!(state.iterations, 0);
        assert!(state.plan.is_none());
        assert!(state.status.is_none());
        assert!(state.critic_decision.is_none());
    }

    #[test]
    fn test_empty_patch_changes_nothing() {
        let state = RunState::new("x", RunMode::Extended);
        assert_eq!(state.clone().apply(StatePatch::default()), state);
    }

    #[test]
    fn test_patch_sets_and_clears() {
        let state = RunState::new("x", RunMode::Standard).apply(StatePatch {
            status: Some(Some(ExecStatus::Works)),
            critic_decision: Some(Some(CriticDecision::Rethink)),
            critic_explanation: Some(Some("wrong answer".into())),
            ..Default::default()
        });
        assert_eq!(state.status, Some(ExecStatus::Works));
        assert_eq!(state.critic_decision, Some(CriticDecision::Rethink));

        let state = state.apply(StatePatch {
            coding: Some("```python\npass\n```".into()),
            status: Some(None),
            critic_decision: Some(None),
            critic_explanation: Some(None),
            iterations: Some(1),
            ..Default::default()
        });
        assert!(state.status.is_none());
        assert!(state.critic_decision.is_none());
        assert!(state.critic_explanation.is_none());
        assert_eq!(state.iterations, 1);
        assert_eq!(state.request, "x");
    }

    #[test]
    fn test_require_reports_stage_and_field() {
        let state = RunState::new("x", RunMode::Standard);
        match state.require_plan(Stage::Generate) {
            Err(RunError::MissingStateField { stage, field }) => {
                assert_eq!(stage, Stage::Generate);
                assert_eq!(field, "plan");
            }
            other => panic!("expected MissingStateField, got {:?}", other),
        }
    }

    #[test]
    fn test_state_serializes_with_wire_labels() {
        let state = RunState::new("x", RunMode::Standard).apply(StatePatch {
            status: Some(Some(ExecStatus::Error)),
            critic_decision: Some(Some(CriticDecision::Works)),
            ..Default::default()
        });
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], "ERROR");
        assert_eq!(value["critic_decision"], "WORKS");
        assert_eq!(value["mode"], "standard");
    }
}
