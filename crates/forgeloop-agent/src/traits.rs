use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::{ApiKey, ResponseSchema};

/// Errors that can occur while calling a generation provider
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited by provider after {0} retries")]
    RateLimited(u32),

    #[error("Provider returned no content")]
    EmptyResponse,

    #[error("Failed to parse provider response: {0}")]
    InvalidResponse(String),

    #[error("Structured output is not valid JSON: {0}")]
    StructuredParse(#[from] serde_json::Error),
}

/// Configuration shared by all generation providers
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Credential sent with every request
    pub api_key: ApiKey,
    /// Model identifier understood by the provider
    pub model: String,
    /// Override for the provider endpoint (None = provider default)
    pub base_url: Option<String>,
    /// Sampling temperature (None = provider default)
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens (None = provider default)
    pub max_output_tokens: Option<u32>,
    /// First delay used when backing off from a rate limit
    pub retry_backoff: Duration,
}

impl GeneratorConfig {
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: None,
            temperature: None,
            max_output_tokens: None,
            retry_backoff: Duration::from_secs(2),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = Some(max);
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Supported generation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Gemini,
    OpenAi,
}

impl ProviderType {
    /// Model used when neither the CLI nor the config names one
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::Gemini => "gemini-2.5-flash-lite",
            ProviderType::OpenAi => "gpt-4o-mini",
        }
    }

    /// Environment variables searched for the credential, in order
    pub fn api_key_vars(&self) -> &'static [&'static str] {
        match self {
            ProviderType::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            ProviderType::OpenAi => &["OPENAI_API_KEY"],
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Gemini => write!(f, "gemini"),
            ProviderType::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "openai" | "open-ai" => Ok(ProviderType::OpenAi),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// The text-generation engine used by every stage of a run
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable provider name (e.g., "Gemini")
    fn name(&self) -> &str;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;

    /// Generate free text for a prompt
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;

    /// Generate a JSON value constrained by `schema`.
    ///
    /// Conformance is the provider's responsibility; callers that route on the
    /// value should still validate it.
    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<serde_json::Value, GeneratorError>;
}
