use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{parse_structured, post_json};
use crate::{Generator, GeneratorConfig, GeneratorError, ResponseSchema};

/// Gemini REST endpoint (v1beta)
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent` binding
pub struct GeminiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(GEMINI_BASE_URL)
            .trim_end_matches('/');
        format!("{}/models/{}:generateContent", base, self.config.model)
    }

    async fn call(
        &self,
        prompt: &str,
        schema: Option<&ResponseSchema>,
    ) -> Result<String, GeneratorError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: schema.map(|_| "application/json"),
                response_schema: schema.map(ResponseSchema::to_gemini_schema),
            },
        };

        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            structured = schema.is_some(),
            "Calling Gemini"
        );

        let headers = [("x-goog-api-key", self.config.api_key.expose().to_string())];
        let text = post_json(
            &self.client,
            &self.endpoint(),
            &headers,
            &request,
            self.config.retry_backoff,
        )
        .await?;

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| GeneratorError::InvalidResponse(format!("{}: {}", e, text)))?;

        let content: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }
        Ok(content)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "Gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        self.call(prompt, None).await
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &ResponseSchema,
    ) -> Result<serde_json::Value, GeneratorError> {
        let text = self.call(prompt, Some(schema)).await?;
        parse_structured(&text)
    }
}
