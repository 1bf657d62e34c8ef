use forgeloop_critic::{truncate_output, CriticDecision};
use forgeloop_sandbox::ExecStatus;

use crate::error::RunError;
use crate::routing::Stage;
use crate::state::RunState;

const OUTPUT_RULES: &str = r#"## Output Rules
- Respond with exactly one fenced code block tagged `python`.
- The block must hold a complete, self-contained program that runs as-is with `python3` and no arguments. Use only the standard library and do not read from stdin.
- The program must exercise itself: run the test cases from the plan and print each input with its result. Use `assert` so a failing case exits with an error.
- Never send a diff, a partial snippet, or more than one file. Every answer replaces the previous program entirely.
- Keep any prose outside the block short."#;

/// Which code-generation prompt the next attempt uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// First attempt from the plan alone
    Fresh,
    /// The last program failed to run
    Repair,
    /// The last program ran but the critic rejected it
    Rework,
}

impl PromptMode {
    /// Pick the mode from the state before the attempt.
    ///
    /// A failed execution wins over a critic rejection.
    pub fn select(state: &RunState) -> Self {
        if state.status == Some(ExecStatus::Error) {
            PromptMode::Repair
        } else if state.critic_decision == Some(CriticDecision::Rethink) {
            PromptMode::Rework
        } else {
            PromptMode::Fresh
        }
    }
}

impl std::fmt::Display for PromptMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromptMode::Fresh => write!(f, "fresh"),
            PromptMode::Repair => write!(f, "repair"),
            PromptMode::Rework => write!(f, "rework"),
        }
    }
}

/// Prompt templates for the generation-side stages
pub struct GenerationPrompts;

impl GenerationPrompts {
    pub fn build_plan_prompt(request: &str) -> String {
        format!(
            r#"You are planning a small Python program for the request below.

## Request
{request}

## Your Task
Write a concise, numbered plan for implementing the request as a single Python program.
End the plan with a **Testing Strategy** section listing concrete test cases (inputs and expected outputs) the program will run on itself.

Only write the plan. Do not write the full program."#
        )
    }

    /// Build the prompt for the given mode, failing if the state lacks its inputs
    pub fn build_code_prompt(mode: PromptMode, state: &RunState) -> Result<String, RunError> {
        let plan = state.require_plan(Stage::Generate)?;

        let prompt = match mode {
            PromptMode::Fresh => format!(
                r#"Write a Python program that fulfils the request, following the plan.

## Request
{request}

## Plan
{plan}

{rules}"#,
                request = state.request,
                plan = plan,
                rules = OUTPUT_RULES,
            ),
            PromptMode::Repair => format!(
                r#"Your previous program failed when it was executed. Fix it.

## Request
{request}

## Plan
{plan}

## Previous Attempt
{coding}

## Execution Result
```
{result}
```

Find the cause of the failure in the execution result and rewrite the whole program so that it runs cleanly.

{rules}"#,
                request = state.request,
                plan = plan,
                coding = state.require_coding(Stage::Generate)?,
                result = truncate_output(state.require_result(Stage::Generate)?, 6000),
                rules = OUTPUT_RULES,
            ),
            PromptMode::Rework => format!(
                r#"Your previous program ran, but a reviewer rejected it.

## Request
{request}

## Plan
{plan}

## Previous Attempt
{coding}

## Execution Result
```
{result}
```

## Reviewer Feedback
{explanation}

Address the reviewer's feedback and rewrite the whole program.

{rules}"#,
                request = state.request,
                plan = plan,
                coding = state.require_coding(Stage::Generate)?,
                result = truncate_output(state.require_result(Stage::Generate)?, 6000),
                explanation = state.require_critic_explanation(Stage::Generate)?,
                rules = OUTPUT_RULES,
            ),
        };

        Ok(prompt)
    }

    pub fn build_summary_prompt(
        plan: &str,
        coding: &str,
        result: &str,
        budget_exhausted: bool,
    ) -> String {
        let status_note = if budget_exhausted {
            "The attempt budget ran out before a reviewer accepted this code, so it may still be failing. Say so plainly and describe what still looks broken."
        } else {
            "A reviewer accepted this code."
        };

        format!(
            r#"Summarize the result of an automated coding session for the person who asked for it.

## Plan
{plan}

## Final Code
{coding}

## Final Execution Result
```
{result}
```

## Status
{status_note}

Write a short summary in plain prose: what the program does, how it was tested, and what the execution showed. Do not repeat the code."#,
            plan = truncate_output(plan, 6000),
            coding = truncate_output(coding, 12000),
            result = truncate_output(result, 6000),
            status_note = status_note,
        )
    }

    pub fn build_lesson_prompt(request: &str, coding: &str, summary: &str) -> String {
        format!(
            r#"You are a patient programming tutor. A learner asked for the program below and wants to understand it.

## Request
{request}

## Code
{coding}

## Summary
{summary}

Walk through the code step by step. Explain the key ideas and the Python features it uses, why each part is there, and how the self-tests check it. Finish with one or two exercises the learner could try next."#,
            coding = truncate_output(coding, 12000),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RunMode, StatePatch};

    fn planned() -> RunState {
        RunState::new("check palindromes", RunMode::Standard).apply(StatePatch {
            plan: Some("1. compare with reverse".into()),
            ..Default::default()
        })
    }

    #[test]
    fn test_select_prefers_error_over_rethink() {
        let state = planned().apply(StatePatch {
            status: Some(Some(ExecStatus::Error)),
            critic_decision: Some(Some(CriticDecision::Rethink)),
            ..Default::default()
        });
        assert_eq!(PromptMode::select(&state), PromptMode::Repair);
    }

    #[test]
    fn test_select_rework_and_fresh() {
        let rejected = planned().apply(StatePatch {
            status: Some(Some(ExecStatus::Works)),
            critic_decision: Some(Some(CriticDecision::Rethink)),
            ..Default::default()
        });
        assert_eq!(PromptMode::select(&rejected), PromptMode::Rework);
        assert_eq!(PromptMode::select(&planned()), PromptMode::Fresh);
    }

    #[test]
    fn test_plan_prompt_forbids_full_program() {
        let prompt = GenerationPrompts::build_plan_prompt("sum a list");
        assert!(prompt.contains("sum a list"));
        assert!(prompt.contains("Testing Strategy"));
        assert!(prompt.contains("Do not write the full program"));
    }

    #[test]
    fn test_fresh_prompt_demands_single_block() {
        let prompt = GenerationPrompts::build_code_prompt(PromptMode::Fresh, &planned()).unwrap();
        assert!(prompt.contains("check palindromes"));
        assert!(prompt.contains("1. compare with reverse"));
        assert!(prompt.contains("exactly one fenced code block"));
    }

    #[test]
    fn test_repair_prompt_includes_failure() {
        let state = planned().apply(StatePatch {
            coding: Some("```python\nprint(\n```".into()),
            result: Some("SyntaxError: '(' was never closed".into()),
            status: Some(Some(ExecStatus::Error)),
            ..Default::default()
        });
        let prompt = GenerationPrompts::build_code_prompt(PromptMode::Repair, &state).unwrap();
        assert!(prompt.contains("print("));
        assert!(prompt.contains("SyntaxError"));
    }

    #[test]
    fn test_rework_prompt_needs_explanation() {
        let state = planned().apply(StatePatch {
            coding: Some("```python\nprint(1)\n```".into()),
            result: Some("Exit code: 0".into()),
            ..Default::default()
        });
        let err = GenerationPrompts::build_code_prompt(PromptMode::Rework, &state).unwrap_err();
        assert!(matches!(
            err,
            RunError::MissingStateField {
                field: "critic_explanation",
                ..
            }
        ));

        let state = state.apply(StatePatch {
            critic_explanation: Some(Some("Never checks palindromes.".into())),
            ..Default::default()
        });
        let prompt = GenerationPrompts::build_code_prompt(PromptMode::Rework, &state).unwrap();
        assert!(prompt.contains("Never checks palindromes."));
    }

    #[test]
    fn test_code_prompt_requires_plan() {
        let state = RunState::new("x", RunMode::Standard);
        let err = GenerationPrompts::build_code_prompt(PromptMode::Fresh, &state).unwrap_err();
        assert!(matches!(
            err,
            RunError::MissingStateField {
                stage: Stage::Generate,
                field: "plan"
            }
        ));
    }

    #[test]
    fn test_summary_prompt_flags_exhausted_budget() {
        let exhausted = GenerationPrompts::build_summary_prompt("p", "c", "r", true);
        assert!(exhausted.contains("may still be failing"));
        let accepted = GenerationPrompts::build_summary_prompt("p", "c", "r", false);
        assert!(!accepted.contains("may still be failing"));
    }
}
