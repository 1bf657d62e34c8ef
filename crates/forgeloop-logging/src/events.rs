use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Structured log events for one run of the loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        request: String,
        mode: String,
        max_iterations: usize,
    },
    /// The orchestrator moved from one stage to the next
    Transition {
        step: usize,
        from: String,
        to: String,
    },
    PlanGenerated {
        plan: String,
    },
    CodeGenerated {
        iteration: usize,
        mode: String,
        code: String,
    },
    ExecutionCompleted {
        iteration: usize,
        status: String,
        language: Option<String>,
        duration_secs: f64,
        result: String,
    },
    CritiqueCompleted {
        iteration: usize,
        decision: String,
        explanation: String,
    },
    BudgetExhausted {
        iterations: usize,
    },
    SummaryGenerated {
        summary: String,
    },
    LessonGenerated {
        lesson: String,
    },
    RunCompleted {
        outcome: String,
        iterations: usize,
        steps: usize,
        duration_secs: f64,
    },
    ErrorEncountered {
        stage: String,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors and visual structure
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for run events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// Logger that writes nothing to the console
    pub fn silent() -> Self {
        Self {
            format: LogFormat::Compact,
            console: false,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    /// Keep file output but turn console output on or off
    pub fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    pub fn log(&self, event: &LogEvent) {
        // Log to file if configured (always JSON format for file)
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RunStarted {
                request,
                mode,
                max_iterations,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╭─────────────────────────────────────────────────────────────────────╮"
                        .bright_blue()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {}{}",
                    "│".bright_blue(),
                    "forgeloop".bold().bright_white(),
                    " ".repeat(58) + &"│".bright_blue().to_string()
                );
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Request:".dimmed(),
                    Self::truncate_with_padding(request, 57, 65).dimmed()
                );
                let settings = format!("{} mode, {} iterations max", mode, max_iterations);
                let _ = writeln!(
                    stderr,
                    "{}  {} {}",
                    "│".bright_blue(),
                    "Run:".dimmed(),
                    Self::truncate_with_padding(&settings, 61, 65).dimmed()
                );
                let _ = writeln!(
                    stderr,
                    "{}",
                    "╰─────────────────────────────────────────────────────────────────────╯"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::Transition { .. } => {
                // Stage headers are printed with each stage's output
            }
            LogEvent::PlanGenerated { plan } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_cyan(),
                    "PLAN".bright_cyan().bold()
                );
                Self::write_block(&mut stderr, plan, 12);
            }
            LogEvent::CodeGenerated {
                iteration,
                mode,
                code,
            } => {
                let iter_text = format!("─ Iteration {} ", iteration);
                let padding = "─".repeat(67usize.saturating_sub(iter_text.chars().count()));
                let _ = writeln!(
                    stderr,
                    "{}{}{}",
                    "┌".bright_blue(),
                    iter_text.bright_blue().bold(),
                    padding.bright_blue()
                );
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {} {}",
                    "▶".bright_cyan(),
                    "GENERATE".bright_cyan().bold(),
                    format!("({})", mode).dimmed()
                );
                Self::write_block(&mut stderr, code, 20);
            }
            LogEvent::ExecutionCompleted {
                status,
                duration_secs,
                result,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_yellow(),
                    "EXECUTE".bright_yellow().bold()
                );
                if status == "WORKS" {
                    let _ = writeln!(
                        stderr,
                        "    {} Works ({:.1}s)",
                        "✓".bright_green(),
                        duration_secs
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "    {} Error ({:.1}s)",
                        "✗".bright_red(),
                        duration_secs
                    );
                }
                Self::write_block(&mut stderr, result, 12);
            }
            LogEvent::CritiqueCompleted {
                decision,
                explanation,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_magenta(),
                    "CRITIQUE".bright_magenta().bold()
                );
                let styled_decision = if decision == "WORKS" {
                    format!("✓ Decision: {}", decision)
                        .bright_green()
                        .to_string()
                } else {
                    format!("→ Decision: {}", decision)
                        .bright_yellow()
                        .to_string()
                };
                let _ = writeln!(stderr, "    {}", styled_decision);
                Self::write_block(&mut stderr, explanation, 6);

                let _ = writeln!(
                    stderr,
                    "{}",
                    "└─────────────────────────────────────────────────────────────────────┘"
                        .bright_blue()
                );
                let _ = writeln!(stderr);
            }
            LogEvent::BudgetExhausted { iterations } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Iteration budget reached ({}), summarizing last attempt",
                    "⚠".bright_yellow(),
                    iterations
                );
                let _ = writeln!(stderr);
            }
            LogEvent::SummaryGenerated { summary } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_green(),
                    "SUMMARY".bright_green().bold()
                );
                Self::write_block(&mut stderr, summary, 12);
            }
            LogEvent::LessonGenerated { lesson } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "▶".bright_white(),
                    "LESSON".bright_white().bold()
                );
                Self::write_block(&mut stderr, lesson, 12);
            }
            LogEvent::RunCompleted { .. } => {
                // This is handled by the final outcome printing in main.rs
            }
            LogEvent::ErrorEncountered { stage, error } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Error in {}: {}",
                    "✗".bright_red(),
                    stage,
                    error.bright_red()
                );
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted { mode, .. } => format!("[{}] run:start {}", timestamp, mode),
            LogEvent::Transition { step, from, to } => {
                format!("[{}] step:{} {}->{}", timestamp, step, from, to)
            }
            LogEvent::PlanGenerated { plan } => {
                format!("[{}] plan:done {} lines", timestamp, plan.lines().count())
            }
            LogEvent::CodeGenerated {
                iteration, mode, ..
            } => format!("[{}] generate:{} {}", timestamp, iteration, mode),
            LogEvent::ExecutionCompleted {
                iteration,
                status,
                duration_secs,
                ..
            } => format!(
                "[{}] execute:{} {} {:.1}s",
                timestamp, iteration, status, duration_secs
            ),
            LogEvent::CritiqueCompleted {
                iteration,
                decision,
                ..
            } => format!("[{}] critique:{} {}", timestamp, iteration, decision),
            LogEvent::BudgetExhausted { iterations } => {
                format!("[{}] budget:exhausted:{}", timestamp, iterations)
            }
            LogEvent::SummaryGenerated { .. } => format!("[{}] summary:done", timestamp),
            LogEvent::LessonGenerated { .. } => format!("[{}] lesson:done", timestamp),
            LogEvent::RunCompleted {
                outcome,
                iterations,
                steps,
                duration_secs,
            } => format!(
                "[{}] run:{} iterations={} steps={} {:.1}s",
                timestamp, outcome, iterations, steps, duration_secs
            ),
            LogEvent::ErrorEncountered { stage, error } => {
                format!("[{}] error:{}:{}", timestamp, stage, error)
            }
        };
        let _ = writeln!(stderr, "{}", msg);
    }

    /// Write up to `max_lines` lines of `text` with a visual indent
    fn write_block(out: &mut impl Write, text: &str, max_lines: usize) {
        let prefix = "    │".dimmed();
        let total = text.lines().count();
        for line in text.lines().take(max_lines) {
            let _ = writeln!(out, "{} {}", prefix, line);
        }
        if total > max_lines {
            let _ = writeln!(
                out,
                "{} {}",
                prefix,
                format!("… {} more lines", total - max_lines).dimmed()
            );
        }
        let _ = writeln!(out);
    }

    /// Truncate a string and pad to exact width
    fn truncate_with_padding(s: &str, max_len: usize, total_width: usize) -> String {
        let first_line = s.lines().next().unwrap_or_default();
        let truncated = if first_line.chars().count() > max_len {
            let head: String = first_line.chars().take(max_len - 3).collect();
            format!("{}...", head)
        } else {
            first_line.to_string()
        };

        let padding_needed = total_width.saturating_sub(truncated.chars().count() + 1); // +1 for trailing │
        format!("{}{}│", truncated, " ".repeat(padding_needed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_events_serialize_with_snake_case_tag() {
        let event = LogEvent::CritiqueCompleted {
            iteration: 2,
            decision: "RETHINK".into(),
            explanation: "returns None".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "critique_completed");
        assert_eq!(json["iteration"], 2);
    }

    #[test]
    fn test_file_sink_appends_timestamped_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");
        let logger = Logger::with_file(LogFormat::Compact, &path)
            .unwrap()
            .console(false);

        logger.log(&LogEvent::PlanGenerated {
            plan: "1. do it".into(),
        });
        logger.log(&LogEvent::BudgetExhausted { iterations: 3 });

        let file = std::fs::File::open(&path).unwrap();
        let lines: Vec<serde_json::Value> = std::io::BufReader::new(file)
            .lines()
            .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "plan_generated");
        assert_eq!(lines[1]["iterations"], 3);
        assert!(lines[1]["timestamp"].is_string());
    }

    #[test]
    fn test_truncate_with_padding_uses_first_line() {
        let padded = Logger::truncate_with_padding("short\nsecond line", 10, 12);
        assert_eq!(padded, "short      │");
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert!("yaml".parse::<LogFormat>().is_err());
    }
}
