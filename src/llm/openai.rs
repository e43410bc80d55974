use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use async_trait::async_trait;

use super::{with_rate_limit_retry, LlmClient, RateLimited};
use crate::errors::PromptQaError;

const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI Chat Completions client. Mirrors [`super::anthropic::AnthropicClient`]'s
/// shape so the planner/evaluator code above never needs to know which
/// vendor is live.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_base: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, PromptQaError> {
        if api_key.trim().is_empty() {
            return Err(PromptQaError::config("OPENAI_API_KEY must not be empty"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
                .map_err(|err| PromptQaError::config(format!("invalid OPENAI_API_KEY: {err}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|err| PromptQaError::llm(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            api_base: "https://api.openai.com/v1/chat/completions".to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    async fn call(&self, system: &str, user_content: Value) -> Result<String, PromptQaError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user_content },
            ],
        });

        with_rate_limit_retry(|| async {
            let response = self
                .client
                .post(&self.api_base)
                .json(&body)
                .send()
                .await
                .map_err(|err| RateLimited::No(format!("openai transport error: {err}")))?;

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
                .map_err(|err| RateLimited::No(format!("openai response read error: {err}")))?;

            if !status.is_success() {
                return Err(RateLimited::No(format!("openai returned {status}: {raw}")));
            }

            let parsed: OpenAiResponse = serde_json::from_str(&raw)
                .map_err(|err| RateLimited::No(format!("failed to parse openai response: {err}")))?;

            parsed
                .first_text()
                .ok_or_else(|| RateLimited::No("openai response had no choices".to_string()))
        })
        .await
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String, PromptQaError> {
        self.call(system, json!(user)).await
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
                "type": "image_url",
                "image_url": { "url": format!("data:{mime_type};base64,{image_base64}") }
            }
        ]);
        self.call(system, content).await
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

impl OpenAiResponse {
    fn first_text(&self) -> Option<String> {
        self.choices.first().map(|choice| choice.message.content.clone())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(OpenAiClient::new(String::new(), None).is_err());
    }

    #[test]
    fn extracts_first_choice_text() {
        let response: OpenAiResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"hello"}}]}"#).unwrap();
        assert_eq!(response.first_text(), Some("hello".to_string()));
    }
}
