mod error;
mod outcome;
pub mod prompts;
pub mod routing;
mod runner;
pub mod stages;
mod state;
mod tutor;

pub use error::RunError;
pub use outcome::RunOutcome;
pub use prompts::{GenerationPrompts, PromptMode};
pub use routing::{route_after_critique, route_after_execute, route_after_summary, Stage};
pub use runner::{required_steps, Orchestrator, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_STEPS};
pub use state::{RunMode, RunState, StatePatch};
pub use tutor::{GeneratorTutor, TeachError, Tutor};

pub use forgeloop_critic::CriticDecision;
pub use forgeloop_sandbox::ExecStatus;
