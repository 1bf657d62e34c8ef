use reqwest::header::RETRY_AFTER;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::GeneratorError;

/// Rate limit retry configuration
pub(crate) const MAX_RETRIES: u32 = 3;
const BACKOFF_MULTIPLIER: u32 = 2;
const MAX_RETRY_AFTER_SECS: u64 = 120;

/// POST a JSON body and return the response text.
///
/// HTTP 429 is retried up to `MAX_RETRIES` times, honouring `Retry-After`
/// when present and backing off exponentially from `backoff` otherwise.
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, String)],
    body: &B,
    backoff: Duration,
) -> Result<String, GeneratorError> {
    let mut retry_count = 0;

    loop {
        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0 && *secs <= MAX_RETRY_AFTER_SECS)
            .map(Duration::from_secs);
        let text = response.text().await?;

        if status.is_success() {
            debug!(status = status.as_u16(), body_len = text.len(), "Provider responded");
            return Ok(text);
        }

        if status.as_u16() == 429 {
            if retry_count >= MAX_RETRIES {
                return Err(GeneratorError::RateLimited(retry_count));
            }
            retry_count += 1;
            let delay = retry_after
                .unwrap_or_else(|| backoff * BACKOFF_MULTIPLIER.pow(retry_count - 1));
            warn!(
                attempt = retry_count,
                max = MAX_RETRIES,
                delay_ms = delay.as_millis() as u64,
                "Rate limited, retrying"
            );
            tokio::time::sleep(delay).await;
            continue;
        }

        return Err(GeneratorError::Api {
            status: status.as_u16(),
            body: text,
        });
    }
}

/// Parse structured output text, tolerating a surrounding ```json fence
pub(crate) fn parse_structured(text: &str) -> Result<serde_json::Value, GeneratorError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    Ok(serde_json::from_str(unfenced.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json() {
        let value = parse_structured(r#" {"decision": "WORKS"} "#).unwrap();
        assert_eq!(value, json!({"decision": "WORKS"}));
    }

    #[test]
    fn test_parse_fenced_json() {
        let value = parse_structured("```json\n{\"decision\": \"RETHINK\"}\n```").unwrap();
        assert_eq!(value, json!({"decision": "RETHINK"}));
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_structured("looks good to me"),
            Err(GeneratorError::StructuredParse(_))
        ));
    }
}
