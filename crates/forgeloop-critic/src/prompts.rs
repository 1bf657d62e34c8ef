/// Prompt templates for the critic
pub struct CriticPrompts;

impl CriticPrompts {
    /// Build the critic evaluation prompt
    pub fn build_evaluation_prompt(plan: &str, coding: &str, result: &str, iteration: usize) -> String {
        format!(
            r#"You are reviewing a Python program produced by an automated coding loop. The program has already been executed in a sandbox; its output is shown below.

## Plan
{plan}

## Generated Code
{coding}

## Execution Result
```
{result}
```

## Context
This is attempt {iteration} of the generate-and-test loop.

---

## Your Task

Decide whether the program is acceptable.

- Answer WORKS when the program ran and its behaviour plausibly satisfies the plan, even if the style, naming, or structure could be better.
- Answer RETHINK only when something is fundamentally broken: it crashes, produces wrong results for the plan's own test cases, never exercises the requested functionality, or solves a different problem.
- Do not ask for a rewrite because of style, missing comments, performance, or extra features.
- When in doubt, answer WORKS.

Respond with the decision and a short explanation (one or two sentences). If you answer RETHINK, the explanation must say what to fix."#,
            plan = truncate_output(plan, 6000),
            coding = truncate_output(coding, 12000),
            result = truncate_output(result, 6000),
            iteration = iteration,
        )
    }
}

/// Truncate to at most `max_len` bytes, preferring a line boundary
pub fn truncate_output(output: &str, max_len: usize) -> &str {
    if output.len() <= max_len {
        return output;
    }

    let mut end = max_len;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    // Try to truncate at a line boundary
    match output[..end].rfind('\n') {
        Some(pos) => &output[..pos],
        None => &output[..end],
    }
}
