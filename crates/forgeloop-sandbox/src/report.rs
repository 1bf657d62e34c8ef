use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome class of the most recent execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecStatus {
    Works,
    Error,
}

impl std::fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecStatus::Works => write!(f, "WORKS"),
            ExecStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Launch-level failures, recovered inside the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFault {
    /// The interpreter could not be started (or its limits could not be applied)
    LaunchFailed(String),
    /// The wall-clock timeout fired and the process group was killed
    TimedOut(Duration),
}

impl std::fmt::Display for ExecutionFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionFault::LaunchFailed(reason) => {
                write!(f, "Failed to launch sandboxed process: {}", reason)
            }
            ExecutionFault::TimedOut(timeout) => write!(
                f,
                "Execution timed out after {}s and was killed",
                timeout.as_secs_f64()
            ),
        }
    }
}

/// Everything captured from one sandboxed execution
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub status: ExecStatus,
    /// Human-readable outcome, labelled by stream
    pub result: String,
    pub stdout: String,
    pub stderr: String,
    /// None when the process never ran to completion or died by signal
    pub exit_code: Option<i32>,
    pub fault: Option<ExecutionFault>,
    pub duration: Duration,
}

impl ExecutionReport {
    pub(crate) fn completed(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        let status = if exit_code == Some(0) {
            ExecStatus::Works
        } else {
            ExecStatus::Error
        };
        let header = match exit_code {
            Some(code) => format!("Exit code: {}", code),
            None => "Process terminated by signal".to_string(),
        };
        Self {
            status,
            result: format!("{}\n{}", header, format_streams(&stdout, &stderr)),
            stdout,
            stderr,
            exit_code,
            fault: None,
            duration,
        }
    }

    pub(crate) fn faulted(
        fault: ExecutionFault,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        let result = if stdout.is_empty() && stderr.is_empty() {
            fault.to_string()
        } else {
            format!("{}\n{}", fault, format_streams(&stdout, &stderr))
        };
        Self {
            status: ExecStatus::Error,
            result,
            stdout,
            stderr,
            exit_code: None,
            fault: Some(fault),
            duration,
        }
    }
}

/// Join both streams into one block, labelled the same way every time
fn format_streams(stdout: &str, stderr: &str) -> String {
    fn section(s: &str) -> &str {
        let trimmed = s.trim_end();
        if trimmed.is_empty() {
            "(empty)"
        } else {
            trimmed
        }
    }
    format!(
        "--- stdout ---\n{}\n--- stderr ---\n{}",
        section(stdout),
        section(stderr)
    )
}
