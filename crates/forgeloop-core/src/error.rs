use thiserror::Error;

use crate::routing::Stage;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Stage {stage} needs `{field}` but it has not been produced yet")]
    MissingStateField { stage: Stage, field: &'static str },

    #[error("Generation error: {0}")]
    Generation(#[from] forgeloop_agent::GeneratorError),

    #[error("Critic evaluation error: {0}")]
    Critic(#[from] forgeloop_critic::EvaluationError),

    #[error("Teaching error: {0}")]
    Teach(#[from] crate::tutor::TeachError),

    #[error("Run exceeded the step budget after {steps} transitions")]
    StepBudgetExceeded { steps: usize },
}
