//! # forgeloop-logging
//!
//! Run-event logging for forgeloop.
//!
//! A run moves through Plan, Generate, Execute, Critique, Summarize and
//! optionally Teach. The orchestrator emits a [`LogEvent`] for each stage's
//! output and a `Transition` event each time it moves on, so progress can be
//! followed on the console and replayed later from a JSON-lines file.
//!
//! Two channels are kept apart:
//!
//! - [`Logger`] writes run events to stderr in the chosen [`LogFormat`] and,
//!   with [`Logger::with_file`], appends them as JSON lines to a file
//! - [`init_tracing`] installs the `tracing` subscriber used for diagnostics
//!   inside the crates, filtered by `RUST_LOG` or the given level

mod events;

pub use events::{LogEvent, LogFormat, Logger};

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the diagnostic subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `level`. Fails if a global subscriber is
/// already set.
pub fn init_tracing(level: &str, format: LogFormat) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_refused() {
        assert!(init_tracing("debug", LogFormat::Compact).is_ok());
        assert!(init_tracing("debug", LogFormat::Json).is_err());
    }
}
