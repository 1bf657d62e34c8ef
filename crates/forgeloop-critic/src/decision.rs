use forgeloop_agent::ResponseSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The critic's verdict on the latest execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriticDecision {
    /// The code does what was asked; stop looping
    Works,
    /// The code is fundamentally broken; rewrite it
    Rethink,
}

impl CriticDecision {
    pub const LABELS: [&'static str; 2] = ["WORKS", "RETHINK"];

    pub fn label(&self) -> &'static str {
        match self {
            CriticDecision::Works => "WORKS",
            CriticDecision::Rethink => "RETHINK",
        }
    }
}

impl std::fmt::Display for CriticDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for CriticDecision {
    type Err = DecisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WORKS" => Ok(CriticDecision::Works),
            "RETHINK" => Ok(CriticDecision::Rethink),
            _ => Err(DecisionParseError::UnknownDecision(s.to_string())),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionParseError {
    #[error("Critic output is not a JSON object")]
    NotAnObject,

    #[error("Critic output is missing the `{0}` field")]
    MissingField(&'static str),

    #[error("Critic returned unknown decision {0:?} (expected WORKS or RETHINK)")]
    UnknownDecision(String),
}

/// A decision plus the critic's short rationale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Critique {
    pub decision: CriticDecision,
    pub explanation: String,
}

impl Critique {
    /// Schema the generation engine must answer with
    pub fn schema() -> ResponseSchema {
        ResponseSchema::new("critique")
            .enum_field(
                "decision",
                &CriticDecision::LABELS,
                "WORKS if the code runs and fulfils the request, RETHINK only if it is fundamentally broken",
            )
            .string_field("explanation", "One or two sentences justifying the decision")
    }

    /// Validate a structured response.
    ///
    /// The engine is supposed to honour the schema, but routing depends on the
    /// tag so it is checked here rather than trusted.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, DecisionParseError> {
        let obj = value.as_object().ok_or(DecisionParseError::NotAnObject)?;

        let decision = obj
            .get("decision")
            .and_then(|v| v.as_str())
            .ok_or(DecisionParseError::MissingField("decision"))?
            .parse::<CriticDecision>()?;

        let explanation = obj
            .get("explanation")
            .and_then(|v| v.as_str())
            .ok_or(DecisionParseError::MissingField("explanation"))?
            .trim()
            .to_string();

        debug!(decision = %decision, "Parsed critic decision");
        Ok(Self {
            decision,
            explanation,
        })
    }

    /// Get a short description of the decision for logging
    pub fn short_description(&self) -> String {
        let first_line = self.explanation.lines().next().unwrap_or_default();
        if first_line.is_empty() {
            self.decision.to_string()
        } else {
            format!("{} ({})", self.decision, first_line)
        }
    }
}
