use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use forgeloop_agent::Generator;
use forgeloop_logging::{LogEvent, Logger};
use forgeloop_sandbox::SandboxExecutor;

use crate::error::RunError;
use crate::outcome::RunOutcome;
use crate::prompts::PromptMode;
use crate::routing::{route_after_critique, route_after_execute, route_after_summary, Stage};
use crate::stages;
use crate::state::{RunMode, RunState, StatePatch};
use crate::tutor::Tutor;

/// Code-generation attempts before the run is forced to wrap up
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Ceiling on stage transitions per run
pub const DEFAULT_MAX_STEPS: usize = 24;

/// Most transitions a legal run with `max_iterations` attempts can take.
///
/// One out of Plan, three per attempt, then two to leave Summarize and Teach.
pub fn required_steps(max_iterations: usize) -> usize {
    max_iterations.saturating_mul(3).saturating_add(3)
}

/// Drives a run through the stage graph
pub struct Orchestrator<'a> {
    generator: &'a dyn Generator,
    executor: &'a SandboxExecutor,
    tutor: Option<&'a dyn Tutor>,
    logger: Arc<Logger>,
    max_iterations: usize,
    max_steps: usize,
    interrupted: Arc<AtomicBool>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        executor: &'a SandboxExecutor,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            generator,
            executor,
            tutor: None,
            logger,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_steps: DEFAULT_MAX_STEPS,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_tutor(mut self, tutor: &'a dyn Tutor) -> Self {
        self.tutor = Some(tutor);
        self
    }

    /// Set the attempt budget, raising the step ceiling if it would cut the run short
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self.max_steps = self.max_steps.max(required_steps(max));
        self
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Run a request from the Plan stage until it terminates
    pub async fn run(&self, request: &str, mode: RunMode) -> Result<RunOutcome, RunError> {
        self.run_from(RunState::new(request, mode)).await
    }

    /// Run an existing state from the Plan stage
    pub async fn run_from(&self, mut state: RunState) -> Result<RunOutcome, RunError> {
        let started = Instant::now();
        let mut stage = Stage::Plan;
        let mut steps = 0;

        self.logger.log(&LogEvent::RunStarted {
            request: state.request.clone(),
            mode: state.mode.to_string(),
            max_iterations: self.max_iterations,
        });

        while stage != Stage::Terminated {
            if self.interrupted.load(Ordering::SeqCst) {
                info!(%stage, "Run interrupted by user");
                let outcome = RunOutcome::interrupted(state, steps, started.elapsed());
                self.log_completed(&outcome);
                return Ok(outcome);
            }

            let stage_started = Instant::now();
            let result = self.run_stage(stage, &state).await;
            state = match result {
                Ok(patch) => state.apply(patch),
                Err(e) => {
                    warn!(%stage, error = %e, "Stage failed");
                    self.logger.log(&LogEvent::ErrorEncountered {
                        stage: stage.to_string(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };
            self.log_stage_output(stage, &state, stage_started.elapsed().as_secs_f64());

            let next = self.next_stage(stage, &state);

            if steps >= self.max_steps {
                let e = RunError::StepBudgetExceeded { steps };
                self.logger.log(&LogEvent::ErrorEncountered {
                    stage: stage.to_string(),
                    error: e.to_string(),
                });
                return Err(e);
            }
            steps += 1;

            debug!(step = steps, from = %stage, to = %next, "Transition");
            self.logger.log(&LogEvent::Transition {
                step: steps,
                from: stage.to_string(),
                to: next.to_string(),
            });
            stage = next;
        }

        let outcome = RunOutcome::finished(state, steps, started.elapsed());
        self.log_completed(&outcome);
        Ok(outcome)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        state: &RunState,
    ) -> Result<StatePatch, RunError> {
        match stage {
            Stage::Plan => stages::plan(self.generator, state).await,
            Stage::Generate => {
                let mode = PromptMode::select(state);
                let patch = stages::generate(self.generator, state).await?;
                self.logger.log(&LogEvent::CodeGenerated {
                    iteration: state.iterations + 1,
                    mode: mode.to_string(),
                    code: patch.coding.clone().unwrap_or_default(),
                });
                Ok(patch)
            }
            Stage::Execute => stages::execute(self.executor, state).await,
            Stage::Critique => stages::critique(self.generator, state).await,
            Stage::Summarize => stages::summarize(self.generator, state).await,
            Stage::Teach => match self.tutor {
                Some(tutor) => stages::teach(tutor, state).await,
                None => Ok(StatePatch::default()),
            },
            Stage::Terminated => Ok(StatePatch::default()),
        }
    }

    fn next_stage(&self, stage: Stage, state: &RunState) -> Stage {
        match stage {
            Stage::Plan => Stage::Generate,
            Stage::Generate => Stage::Execute,
            Stage::Execute => route_after_execute(state, self.max_iterations),
            Stage::Critique => {
                let next = route_after_critique(state, self.max_iterations);
                if next == Stage::Summarize && !state.is_accepted() {
                    info!(iterations = state.iterations, "Attempt budget exhausted");
                    self.logger.log(&LogEvent::BudgetExhausted {
                        iterations: state.iterations,
                    });
                }
                next
            }
            Stage::Summarize => route_after_summary(state, self.tutor.is_some()),
            Stage::Teach | Stage::Terminated => Stage::Terminated,
        }
    }

    fn log_stage_output(&self, stage: Stage, state: &RunState, duration_secs: f64) {
        let event = match stage {
            Stage::Plan => LogEvent::PlanGenerated {
                plan: state.plan.clone().unwrap_or_default(),
            },
            Stage::Execute => LogEvent::ExecutionCompleted {
                iteration: state.iterations,
                status: state
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                language: state.language.clone(),
                duration_secs,
                result: state.result.clone().unwrap_or_default(),
            },
            Stage::Critique => LogEvent::CritiqueCompleted {
                iteration: state.iterations,
                decision: state
                    .critic_decision
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
                explanation: state.critic_explanation.clone().unwrap_or_default(),
            },
            Stage::Summarize => LogEvent::SummaryGenerated {
                summary: state.summary.clone().unwrap_or_default(),
            },
            Stage::Teach => LogEvent::LessonGenerated {
                lesson: state.lesson.clone().unwrap_or_default(),
            },
            // Logged from run_stage where the prompt mode is known
            Stage::Generate | Stage::Terminated => return,
        };
        self.logger.log(&event);
    }

    fn log_completed(&self, outcome: &RunOutcome) {
        self.logger.log(&LogEvent::RunCompleted {
            outcome: outcome.label().to_string(),
            iterations: outcome.state().iterations,
            steps: outcome.steps(),
            duration_secs: outcome.total_duration_secs(),
        });
    }
}
