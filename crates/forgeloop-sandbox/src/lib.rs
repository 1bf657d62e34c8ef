//! # forgeloop-sandbox
//!
//! Turns generated text into an executed program.
//!
//! - [`extract_code_block`] pulls the first fenced block out of generated text.
//! - [`SandboxExecutor`] runs code in a fresh interpreter process with a
//!   wall-clock timeout and resource limits, and never fails at the type level:
//!   launch faults and timeouts come back as an [`ExecutionReport`] with
//!   [`ExecStatus::Error`].

mod executor;
mod extract;
#[cfg(unix)]
mod limits;
mod report;

pub use executor::{ResourceLimits, SandboxConfig, SandboxExecutor};
pub use extract::{extract_code_block, is_supported_language, CodeBlock, ExtractionError};
pub use report::{ExecStatus, ExecutionFault, ExecutionReport};
