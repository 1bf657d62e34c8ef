//! Interactive initialization for forgeloop.
//!
//! Sets up the global config file with user-selected defaults.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Select;
use std::fs;
use std::process::Command;

use forgeloop_agent::ProviderType;

use crate::config::{global_config_path, FileConfig};

/// Provider info for display and config
struct ProviderInfo {
    display_name: &'static str,
    provider: ProviderType,
}

const PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        display_name: "Google Gemini",
        provider: ProviderType::Gemini,
    },
    ProviderInfo {
        display_name: "OpenAI-compatible",
        provider: ProviderType::OpenAi,
    },
];

pub fn handle_init() -> Result<()> {
    eprintln!("{}", "Setting up forgeloop...".bold());
    eprintln!();

    // Step 1: Show which providers already have a key in the environment
    eprintln!("{}", "Checking for API keys...".dimmed());
    for info in PROVIDERS {
        let vars = info.provider.api_key_vars();
        match vars.iter().find(|v| std::env::var(v).is_ok_and(|k| !k.trim().is_empty())) {
            Some(var) => eprintln!("  {} {} ({})", "✓".bright_green(), info.display_name, var),
            None => eprintln!(
                "  {} {} (set {})",
                "✗".dimmed(),
                info.display_name,
                vars.join(" or ")
            ),
        }
    }

    if !interpreter_available("python3") {
        eprintln!();
        eprintln!(
            "{} python3 was not found in PATH; generated code cannot run without it.",
            "⚠".bright_yellow()
        );
    }
    eprintln!();

    // Step 2: Pick default provider
    let items: Vec<&str> = PROVIDERS.iter().map(|p| p.display_name).collect();
    let selection = Select::new()
        .with_prompt("Select your default provider")
        .items(&items)
        .default(0)
        .interact()?;
    let provider = PROVIDERS[selection].provider;

    // Step 3: Write global config
    let config_path =
        global_config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if config_path.exists() {
        eprintln!(
            "{} Config already exists at {}",
            "⚠".bright_yellow(),
            config_path.display()
        );

        let overwrite = Select::new()
            .with_prompt("Overwrite existing config?")
            .items(&["No, keep existing", "Yes, replace it"])
            .default(0)
            .interact()?;

        if overwrite == 0 {
            eprintln!();
            eprintln!("Keeping existing config. Edit it manually if needed:");
            eprintln!("  {}", config_path.display().to_string().dimmed());
            return Ok(());
        }
    }

    let config = FileConfig {
        provider: Some(provider.to_string()),
        model: Some(provider.default_model().to_string()),
        ..Default::default()
    };
    let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, content)?;

    eprintln!();
    eprintln!(
        "{} Config saved to {}",
        "✓".bright_green(),
        config_path.display()
    );

    print_getting_started();

    Ok(())
}

fn interpreter_available(name: &str) -> bool {
    Command::new(name)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Print the getting started guide
pub fn print_getting_started() {
    eprintln!();
    eprintln!("{}", "Getting started:".bold());
    eprintln!(
        "  {} Create a request.md describing the program you want (or use {})",
        "1.".dimmed(),
        "--request \"...\"".bright_cyan()
    );
    eprintln!("  {} Run: {}", "2.".dimmed(), "forgeloop run".bright_cyan());
    eprintln!(
        "  {} Add {} for a step-by-step lesson on the result",
        "3.".dimmed(),
        "--extended".bright_cyan()
    );
}
