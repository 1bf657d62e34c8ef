mod config;
mod init;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::Password;

use forgeloop_agent::{
    create_generator, resolve_api_key, ApiKey, CredentialError, GeneratorConfig, ProviderType,
};
use forgeloop_core::{GeneratorTutor, Orchestrator, RunMode, RunOutcome, RunState};
use forgeloop_logging::{init_tracing, LogFormat, Logger};
use forgeloop_sandbox::SandboxExecutor;

use crate::config::{CliOverrides, FileConfig, RunSettings};

/// Exit code for a run that failed with an error
const EXIT_RUN_ERROR: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "forgeloop",
    about = "Plan, generate, execute and critique code until it works",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the loop on a request
    Run(RunArgs),
    /// Write the global config interactively
    Init,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Coding request (or reads from request.md if not provided)
    #[arg(short, long)]
    request: Option<String>,

    /// Path to request file (default: ./request.md)
    #[arg(long, default_value = "request.md")]
    request_file: PathBuf,

    /// Add a step-by-step lesson after the summary
    #[arg(long)]
    extended: bool,

    /// Code-generation attempts before wrapping up (default: 3)
    #[arg(short = 'n', long)]
    max_iterations: Option<usize>,

    /// Wall-clock limit for each execution, in seconds (default: 10)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Generation provider
    #[arg(short, long, value_enum)]
    provider: Option<ProviderChoice>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Also append every event as JSON lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Diagnostic log level (RUST_LOG overrides)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show what would happen without executing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderChoice {
    Gemini,
    Openai,
}

impl From<ProviderChoice> for ProviderType {
    fn from(choice: ProviderChoice) -> Self {
        match choice {
            ProviderChoice::Gemini => ProviderType::Gemini,
            ProviderChoice::Openai => ProviderType::OpenAi,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => init::handle_init(),
        Commands::Run(args) => {
            let code = handle_run(args).await?;
            std::process::exit(code);
        }
    }
}

async fn handle_run(args: RunArgs) -> Result<i32> {
    let log_format: LogFormat = args.log_format.into();
    init_tracing(&args.log_level, log_format).context("Failed to initialize logging")?;

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;

    // CLI > project > global > defaults
    let file_config = match FileConfig::load_project(&working_dir)? {
        Some(project) => match FileConfig::load_global()? {
            Some(global) => project.or(global),
            None => project,
        },
        None => FileConfig::load_global()?.unwrap_or_default(),
    };
    let settings = RunSettings::resolve(
        CliOverrides {
            provider: args.provider.map(Into::into),
            model: args.model.clone(),
            max_iterations: args.max_iterations,
            timeout_secs: args.timeout_secs,
        },
        file_config,
    )?;

    let request = get_request(&args, &working_dir)?;
    let mode = if args.extended {
        RunMode::Extended
    } else {
        RunMode::Standard
    };

    if args.dry_run {
        print_dry_run(&request, mode, &settings);
        return Ok(0);
    }

    // Checked once, before any generation call
    let api_key = obtain_api_key(&settings)?;

    let generator = create_generator(
        settings.provider,
        GeneratorConfig::new(api_key, settings.model.clone()),
    );
    let executor = SandboxExecutor::new(settings.sandbox.clone());

    let logger = match &args.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };
    let logger = Arc::new(logger);

    let tutor = GeneratorTutor::new(generator.as_ref());
    let mut orchestrator = Orchestrator::new(generator.as_ref(), &executor, logger)
        .with_max_iterations(settings.max_iterations)
        .with_max_steps(settings.max_steps);
    if mode == RunMode::Extended {
        orchestrator = orchestrator.with_tutor(&tutor);
    }

    // Handle Ctrl+C gracefully
    let interrupt_handle = orchestrator.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing current stage...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let outcome = match orchestrator.run(&request, mode).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "=== FAILED ===".bright_red().bold(), e);
            return Ok(EXIT_RUN_ERROR);
        }
    };

    if args.json_output {
        let json = serde_json::to_string_pretty(&outcome)?;
        println!("{}", json);
    } else {
        print_outcome(&outcome);
    }

    Ok(outcome.exit_code())
}

fn get_request(args: &RunArgs, working_dir: &Path) -> Result<String> {
    // Prefer --request flag
    if let Some(ref request) = args.request {
        return Ok(request.clone());
    }

    let request_path = if args.request_file.is_absolute() {
        args.request_file.clone()
    } else {
        working_dir.join(&args.request_file)
    };

    if request_path.exists() {
        let content =
            std::fs::read_to_string(&request_path).context("Failed to read request file")?;
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("{} is empty", request_path.display());
        }
        Ok(content.to_string())
    } else {
        anyhow::bail!(
            "No request provided. Use --request or create a {} file",
            args.request_file.display()
        )
    }
}

/// Key from the environment, or typed in when running interactively
fn obtain_api_key(settings: &RunSettings) -> Result<ApiKey> {
    match resolve_api_key(settings.provider, settings.api_key_env.as_deref()) {
        Ok(key) => Ok(key),
        Err(missing @ CredentialError::Missing { .. }) if std::io::stdin().is_terminal() => {
            eprintln!("{} {}", "⚠".bright_yellow(), missing);
            let typed = Password::new()
                .with_prompt(format!("{} API key", settings.provider))
                .interact()?;
            Ok(ApiKey::new(typed)?)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_dry_run(request: &str, mode: RunMode, settings: &RunSettings) {
    println!("=== Dry Run ===");
    let preview: String = request.chars().take(100).collect();
    if preview.len() < request.len() {
        println!("Request: {}...", preview);
    } else {
        println!("Request: {}", request);
    }
    println!("Mode: {}", mode);
    println!("Provider: {}", settings.provider);
    println!("Model: {}", settings.model);
    println!("Max iterations: {}", settings.max_iterations);
    println!("Max steps: {}", settings.max_steps);
    println!("Interpreter: {}", settings.sandbox.interpreter.display());
    println!("Timeout: {}s", settings.sandbox.timeout.as_secs());
    match settings.sandbox.limits.memory_bytes {
        Some(bytes) => println!("Memory limit: {} MiB", bytes / (1024 * 1024)),
        None => println!("Memory limit: none"),
    }
    println!(
        "Network isolation: {}",
        if settings.sandbox.limits.isolate_network {
            "on"
        } else {
            "off"
        }
    );
}

fn print_outcome(outcome: &RunOutcome) {
    let state = outcome.state();

    println!();
    match outcome {
        RunOutcome::Accepted { .. } => println!("{}", "=== ACCEPTED ===".bright_green().bold()),
        RunOutcome::BudgetExhausted { .. } => {
            println!("{}", "=== INCOMPLETE ===".bright_yellow().bold());
            println!("The attempt budget ran out; the code may still be failing.");
        }
        RunOutcome::Interrupted { .. } => {
            println!("{}", "=== INTERRUPTED ===".bright_yellow().bold())
        }
    }
    println!(
        "Iterations: {}  Steps: {}  Duration: {:.1}s",
        state.iterations,
        outcome.steps(),
        outcome.total_duration_secs()
    );

    print_state(state);
}

fn print_state(state: &RunState) {
    let status = state.status.map(|s| s.to_string());
    let decision = state.critic_decision.map(|d| d.to_string());

    print_field("Plan", state.plan.as_deref());
    print_field("Code", state.coding.as_deref());
    print_field("Result", state.result.as_deref());
    print_field("Status", status.as_deref());
    print_field("Critic", decision.as_deref());
    print_field("Critic explanation", state.critic_explanation.as_deref());
    print_field("Summary", state.summary.as_deref());
    if state.lesson.is_some() {
        print_field("Lesson", state.lesson.as_deref());
    }
}

fn print_field(name: &str, value: Option<&str>) {
    println!();
    println!("{}", format!("## {}", name).bold());
    println!("{}", value.unwrap_or("(none)").trim_end());
}
