use forgeloop_agent::{Generator, GeneratorError};
use tracing::{debug, info};

use crate::{CriticPrompts, Critique, DecisionParseError};

/// Inputs required to evaluate the latest attempt.
#[derive(Clone, Copy)]
pub struct CriticEvaluationInput<'a> {
    pub plan: &'a str,
    pub coding: &'a str,
    pub result: &'a str,
    pub iteration: usize,
}

/// Evaluator that asks the generation engine for a constrained verdict
pub struct CriticEvaluator<'a> {
    generator: &'a dyn Generator,
}

impl<'a> CriticEvaluator<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self { generator }
    }

    /// Classify the latest execution as WORKS or RETHINK
    pub async fn evaluate(
        &self,
        input: CriticEvaluationInput<'_>,
    ) -> Result<Critique, EvaluationError> {
        let prompt = CriticPrompts::build_evaluation_prompt(
            input.plan,
            input.coding,
            input.result,
            input.iteration,
        );

        debug!(
            prompt_len = prompt.len(),
            iteration = input.iteration,
            "Running critic evaluation"
        );

        let value = self
            .generator
            .generate_structured(&prompt, &Critique::schema())
            .await?;

        let critique = Critique::from_value(&value)?;

        info!(
            iteration = input.iteration,
            critique = %critique.short_description(),
            "Critic completed"
        );

        Ok(critique)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Critic generation failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Critic returned an invalid decision: {0}")]
    InvalidDecision(#[from] DecisionParseError),
}
