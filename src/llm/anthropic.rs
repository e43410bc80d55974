use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use async_trait::async_trait;

use super::{with_rate_limit_retry, LlmClient, RateLimited};
use crate::errors::PromptQaError;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

/// Anthropic Messages API client, reqwest-backed. Only the two-method
/// [`LlmClient`] surface is exposed upward; everything below (headers,
/// request/response JSON shape, rate-limit retry) stays private to this
/// module.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, PromptQaError> {
        if api_key.trim().is_empty() {
            return Err(PromptQaError::config("ANTHROPIC_API_KEY must not be empty"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|err| PromptQaError::config(format!("invalid ANTHROPIC_API_KEY: {err}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|err| PromptQaError::llm(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            api_base: "https://api.anthropic.com/v1/messages".to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    async fn call(&self, system: &str, user_content: Value) -> Result<String, PromptQaError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{ "role": "user", "content": user_content }],
        });

        with_rate_limit_retry(|| async {
            let response = self
                .client
                .post(&self.api_base)
                .json(&body)
                .send()
                .await
                .map_err(|err| RateLimited::No(format!("anthropic transport error: {err}")))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(std::time::Duration::from_secs);
                return Err(RateLimited::Yes { retry_after });
            }

            let raw = response
                .text()
                .await
                .map_err(|err| RateLimited::No(format!("anthropic response read error: {err}")))?;

            if !status.is_success() {
                return Err(RateLimited::No(format!("anthropic returned {status}: {raw}")));
            }

            let parsed: AnthropicResponse = serde_json::from_str(&raw)
                .map_err(|err| RateLimited::No(format!("failed to parse anthropic response: {err}")))?;

            Ok(parsed.text())
        })
        .await
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String, PromptQaError> {
        self.call(system, json!([{ "type": "text", "text": user }])).await
    }

    async fn generate_with_image(
        &self,
        system: &str,
        user: &str,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<String, PromptQaError> {
        let content = json!([
            { "type": "text", "text": user },
            {
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": mime_type,
                    "data": image_base64,
                }
            }
        ]);
        self.call(system, content).await
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

impl AnthropicResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(AnthropicClient::new(String::new(), None).is_err());
    }

    #[test]
    fn joins_multiple_text_blocks() {
        let response = AnthropicResponse {
            content: vec![
                AnthropicContentBlock::Text { text: "a".into() },
                AnthropicContentBlock::Text { text: "b".into() },
            ],
        };
        assert_eq!(response.text(), "a\nb");
    }
}
