//! The stages of a run.
//!
//! Each stage reads the current state and returns a [`StatePatch`]; none of them
//! mutate the state or decide where the run goes next.

use forgeloop_agent::Generator;
use forgeloop_critic::{CriticEvaluationInput, CriticEvaluator};
use forgeloop_sandbox::{
    extract_code_block, is_supported_language, ExecStatus, ExtractionError, SandboxExecutor,
};
use tracing::{debug, info, warn};

use crate::error::RunError;
use crate::prompts::{GenerationPrompts, PromptMode};
use crate::routing::Stage;
use crate::state::{RunState, StatePatch};
use crate::tutor::Tutor;

/// Write the plan and reset the attempt counter.
pub async fn plan(generator: &dyn Generator, state: &RunState) -> Result<StatePatch, RunError> {
    let prompt = GenerationPrompts::build_plan_prompt(&state.request);
    let plan = generator.generate(&prompt).await?;

    Ok(StatePatch {
        plan: Some(plan),
        iterations: Some(0),
        ..Default::default()
    })
}

/// Produce a full replacement program.
///
/// The prompt mode comes from the state as it was before this attempt; the
/// patch then clears the execution status and the critic's verdict.
pub async fn generate(
    generator: &dyn Generator,
    state: &RunState,
) -> Result<StatePatch, RunError> {
    let mode = PromptMode::select(state);
    let prompt = GenerationPrompts::build_code_prompt(mode, state)?;

    debug!(%mode, iteration = state.iterations + 1, "Generating code");
    let coding = generator.generate(&prompt).await?;

    Ok(StatePatch {
        coding: Some(coding),
        iterations: Some(state.iterations + 1),
        status: Some(None),
        critic_decision: Some(None),
        critic_explanation: Some(None),
        ..Default::default()
    })
}

/// Extract the program from the latest artifact and run it.
///
/// Nothing that goes wrong with the generated code is an error here: a missing
/// block, an unsupported language, a crash or a timeout all become
/// `status = ERROR` with a result describing what happened.
pub async fn execute(executor: &SandboxExecutor, state: &RunState) -> Result<StatePatch, RunError> {
    let coding = state.require_coding(Stage::Execute)?;

    let block = match extract_code_block(coding) {
        Ok(block) => block,
        Err(e) => {
            warn!(error = %e, "Generated output had no runnable block");
            return Ok(failed(None, extraction_message(&e)));
        }
    };

    if !is_supported_language(block.language.as_deref()) {
        let tag = block.language.clone().unwrap_or_default();
        warn!(language = %tag, "Generated block is not Python");
        return Ok(failed(
            block.language,
            format!(
                "The code block is tagged `{}`, but only Python can be executed. Answer with a ```python block.",
                tag
            ),
        ));
    }

    let report = executor.run(&block.code).await;
    info!(
        status = %report.status,
        exit_code = ?report.exit_code,
        duration_ms = report.duration.as_millis() as u64,
        "Execution finished"
    );

    Ok(StatePatch {
        language: Some(block.language),
        result: Some(report.result),
        status: Some(Some(report.status)),
        ..Default::default()
    })
}

fn failed(language: Option<String>, result: String) -> StatePatch {
    StatePatch {
        language: Some(language),
        result: Some(result),
        status: Some(Some(ExecStatus::Error)),
        ..Default::default()
    }
}

fn extraction_message(error: &ExtractionError) -> String {
    match error {
        ExtractionError::NoCodeBlock => "No code block was found in the response, so nothing was executed. Wrap the complete program in a single ```python fenced block.".to_string(),
        ExtractionError::EmptyBlock => "The fenced code block was empty, so nothing was executed. Put the complete program inside the block.".to_string(),
    }
}

/// Ask the critic for a verdict on the latest execution.
pub async fn critique(
    generator: &dyn Generator,
    state: &RunState,
) -> Result<StatePatch, RunError> {
    let input = CriticEvaluationInput {
        plan: state.require_plan(Stage::Critique)?,
        coding: state.require_coding(Stage::Critique)?,
        result: state.require_result(Stage::Critique)?,
        iteration: state.iterations,
    };

    let critique = CriticEvaluator::new(generator).evaluate(input).await?;

    Ok(StatePatch {
        critic_decision: Some(Some(critique.decision)),
        critic_explanation: Some(Some(critique.explanation)),
        ..Default::default()
    })
}

/// Describe the terminal state for the user.
pub async fn summarize(
    generator: &dyn Generator,
    state: &RunState,
) -> Result<StatePatch, RunError> {
    let prompt = GenerationPrompts::build_summary_prompt(
        state.require_plan(Stage::Summarize)?,
        state.require_coding(Stage::Summarize)?,
        state.require_result(Stage::Summarize)?,
        !state.is_accepted(),
    );
    let summary = generator.generate(&prompt).await?;

    Ok(StatePatch {
        summary: Some(summary),
        ..Default::default()
    })
}

/// Extended mode only: turn the final program into a lesson.
pub async fn teach(tutor: &dyn Tutor, state: &RunState) -> Result<StatePatch, RunError> {
    let lesson = tutor.teach(state).await?;

    Ok(StatePatch {
        lesson: Some(lesson),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RunMode;
    use forgeloop_sandbox::SandboxConfig;

    fn with_coding(coding: &str) -> RunState {
        RunState::new("x", RunMode::Standard).apply(StatePatch {
            plan: Some("plan".into()),
            coding: Some(coding.into()),
            iterations: Some(1),
            ..Default::default()
        })
    }

    fn executor() -> SandboxExecutor {
        SandboxExecutor::new(SandboxConfig::default().with_network_isolation(false))
    }

    #[tokio::test]
    async fn test_execute_without_block_is_an_error_result() {
        let state = with_coding("Here is my answer: print('hi')");
        let patch = execute(&executor(), &state).await.unwrap();
        assert_eq!(patch.status, Some(Some(ExecStatus::Error)));
        assert!(patch.result.unwrap().contains("No code block was found"));
    }

    #[tokio::test]
    async fn test_execute_rejects_other_languages() {
        let state = with_coding("```rust\nfn main() {}\n```");
        let patch = execute(&executor(), &state).await.unwrap();
        assert_eq!(patch.status, Some(Some(ExecStatus::Error)));
        assert_eq!(patch.language, Some(Some("rust".to_string())));
        assert!(patch.result.unwrap().contains("only Python"));
    }

    #[tokio::test]
    async fn test_execute_runs_the_block() {
        let state = with_coding("Sure:\n```python\nprint(6 * 7)\n```\nDone.");
        let patch = execute(&executor(), &state).await.unwrap();
        assert_eq!(patch.status, Some(Some(ExecStatus::Works)));
        assert!(patch.result.unwrap().contains("42"));
    }

    #[tokio::test]
    async fn test_execute_requires_coding() {
        let state = RunState::new("x", RunMode::Standard);
        let err = execute(&executor(), &state).await.unwrap_err();
        assert!(matches!(
            err,
            RunError::MissingStateField {
                stage: Stage::Execute,
                field: "coding"
            }
        ));
    }
}
