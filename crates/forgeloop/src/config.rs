//! Configuration file support for forgeloop.
//!
//! Settings come from, in order of priority: command-line flags, a
//! `forgeloop.toml` in the working directory, the global config at
//! `~/.config/forgeloop/config.toml`, and built-in defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use forgeloop_agent::ProviderType;
use forgeloop_core::{required_steps, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_STEPS};
use forgeloop_sandbox::SandboxConfig;

/// The project config file name
pub const CONFIG_FILE_NAME: &str = "forgeloop.toml";

/// Directory under the user config dir holding the global config
pub const GLOBAL_CONFIG_DIR: &str = "forgeloop";
pub const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Settings shared by the project and global config files
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub max_iterations: Option<usize>,
    pub max_steps: Option<usize>,
    #[serde(default, skip_serializing_if = "SandboxSection::is_empty")]
    pub sandbox: SandboxSection,
}

/// The `[sandbox]` table
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SandboxSection {
    pub interpreter: Option<String>,
    pub timeout_secs: Option<u64>,
    pub memory_limit_mb: Option<u64>,
    pub isolate_network: Option<bool>,
}

impl SandboxSection {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl FileConfig {
    /// Load a config file.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load_file(config_path: &Path) -> Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Load `forgeloop.toml` from the working directory
    pub fn load_project(working_dir: &Path) -> Result<Option<Self>> {
        Self::load_file(&working_dir.join(CONFIG_FILE_NAME))
    }

    /// Load the per-user config, if there is a config directory at all
    pub fn load_global() -> Result<Option<Self>> {
        match global_config_path() {
            Some(path) => Self::load_file(&path),
            None => Ok(None),
        }
    }

    /// Fill every unset field from `fallback`
    pub fn or(self, fallback: FileConfig) -> Self {
        Self {
            provider: self.provider.or(fallback.provider),
            model: self.model.or(fallback.model),
            api_key_env: self.api_key_env.or(fallback.api_key_env),
            max_iterations: self.max_iterations.or(fallback.max_iterations),
            max_steps: self.max_steps.or(fallback.max_steps),
            sandbox: SandboxSection {
                interpreter: self.sandbox.interpreter.or(fallback.sandbox.interpreter),
                timeout_secs: self.sandbox.timeout_secs.or(fallback.sandbox.timeout_secs),
                memory_limit_mb: self
                    .sandbox
                    .memory_limit_mb
                    .or(fallback.sandbox.memory_limit_mb),
                isolate_network: self
                    .sandbox
                    .isolate_network
                    .or(fallback.sandbox.isolate_network),
            },
        }
    }
}

pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Values given on the command line; `None` means not given
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub provider: Option<ProviderType>,
    pub model: Option<String>,
    pub max_iterations: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub provider: ProviderType,
    pub model: String,
    pub api_key_env: Option<String>,
    pub max_iterations: usize,
    pub max_steps: usize,
    pub sandbox: SandboxConfig,
}

impl RunSettings {
    pub fn resolve(cli: CliOverrides, file: FileConfig) -> Result<Self> {
        let provider = match (cli.provider, file.provider.as_deref()) {
            (Some(provider), _) => provider,
            (None, Some(name)) => name
                .parse::<ProviderType>()
                .map_err(anyhow::Error::msg)
                .context("Invalid `provider` in config")?,
            (None, None) => ProviderType::Gemini,
        };

        // A model from the file only makes sense for the provider it was written for
        let model = cli
            .model
            .or(if cli.provider.is_none() { file.model } else { None })
            .unwrap_or_else(|| provider.default_model().to_string());

        let max_iterations = cli
            .max_iterations
            .or(file.max_iterations)
            .unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            anyhow::bail!("max_iterations must be at least 1");
        }

        let mut sandbox = SandboxConfig::default();
        if let Some(interpreter) = file.sandbox.interpreter {
            sandbox = sandbox.with_interpreter(interpreter);
        }
        if let Some(secs) = cli.timeout_secs.or(file.sandbox.timeout_secs) {
            if secs == 0 {
                anyhow::bail!("timeout_secs must be at least 1");
            }
            sandbox = sandbox.with_timeout(Duration::from_secs(secs));
        }
        if let Some(mb) = file.sandbox.memory_limit_mb {
            // 0 turns the limit off
            let bytes = match mb {
                0 => None,
                mb => Some(
                    mb.checked_mul(1024 * 1024)
                        .context("memory_limit_mb is too large")?,
                ),
            };
            sandbox = sandbox.with_memory_limit(bytes);
        }
        if let Some(isolate) = file.sandbox.isolate_network {
            sandbox = sandbox.with_network_isolation(isolate);
        }

        let required = required_steps(max_iterations);
        let max_steps = match file.max_steps {
            Some(steps) if steps < required => anyhow::bail!(
                "max_steps is {steps} but {max_iterations} iterations need at least {required}"
            ),
            Some(steps) => steps,
            None => DEFAULT_MAX_STEPS.max(required),
        };

        Ok(Self {
            provider,
            model,
            api_key_env: file.api_key_env,
            max_iterations,
            max_steps,
            sandbox,
        })
    }
}
