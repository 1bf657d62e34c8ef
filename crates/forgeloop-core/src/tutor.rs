use async_trait::async_trait;
use forgeloop_agent::{Generator, GeneratorError};
use thiserror::Error;
use tracing::debug;

use crate::prompts::GenerationPrompts;
use crate::state::RunState;

#[derive(Error, Debug)]
pub enum TeachError {
    #[error("Tutor generation failed: {0}")]
    Generator(#[from] GeneratorError),

    #[error("Nothing to teach: the run has no {0}")]
    NothingToTeach(&'static str),
}

/// Explains a finished run to a learner
#[async_trait]
pub trait Tutor: Send + Sync {
    async fn teach(&self, state: &RunState) -> Result<String, TeachError>;
}

/// Tutor backed by the same generation engine as the rest of the run
pub struct GeneratorTutor<'a> {
    generator: &'a dyn Generator,
}

impl<'a> GeneratorTutor<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Tutor for GeneratorTutor<'_> {
    async fn teach(&self, state: &RunState) -> Result<String, TeachError> {
        let coding = state
            .coding
            .as_deref()
            .ok_or(TeachError::NothingToTeach("code"))?;
        let summary = state.summary.as_deref().unwrap_or_default();

        let prompt = GenerationPrompts::build_lesson_prompt(&state.request, coding, summary);
        debug!(prompt_len = prompt.len(), "Requesting lesson");

        Ok(self.generator.generate(&prompt).await?)
    }
}
