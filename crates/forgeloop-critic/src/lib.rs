mod decision;
pub mod evaluator;
mod prompts;

pub use decision::{CriticDecision, Critique, DecisionParseError};
pub use evaluator::{CriticEvaluationInput, CriticEvaluator, EvaluationError};
pub use prompts::{truncate_output, CriticPrompts};
