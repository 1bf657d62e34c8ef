use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::http::{parse_structured, post_json};
use crate::{Generator, GeneratorConfig, GeneratorError, ResponseSchema};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible chat completions binding
pub struct OpenAiGenerator {
    client: reqwest::Client,
    config: GeneratorConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: Option<String>,
}

impl OpenAiGenerator {
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
            .unwrap_or(OPENAI_BASE_URL)
            .trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    async fn call(
        &self,
        prompt: &str,
        schema: Option<&ResponseSchema>,
    ) -> Result<String, GeneratorError> {
        let response_format = schema.map(|s| {
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": s.name,
                    "strict": true,
                    "schema": s.to_json_schema(),
                }
            })
        });

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_output_tokens,
            response_format,
        };

        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            structured = schema.is_some(),
            "Calling chat completions"
        );

        let headers = [(
            "Authorization",
            format!("Bearer {}", self.config.api_key.expose()),
        )];
        let text = post_json(
            &self.client,
            &self.endpoint(),
            &headers,
            &request,
            self.config.retry_backoff,
        )
        .await?;

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| GeneratorError::InvalidResponse(format!("{}: {}", e, text)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GeneratorError::EmptyResponse)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        "OpenAI"
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
