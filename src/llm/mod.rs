pub mod anthropic;
pub mod json_extract;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;

use crate::errors::PromptQaError;

/// Hides the concrete LLM vendor behind a two-method interface. Everything
/// above this trait — planner, evaluator, agent loop — only ever calls
/// `generate`/`generate_with_image` and never touches HTTP or vendor JSON
/// shapes directly.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, PromptQaError>;

    /// Vision-capable call. Providers that don't support images fall back
    /// to the text-only call, ignoring the screenshot.
    async fn generate_with_image(
        &self,
        system: &str,
        user: &str,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<String, PromptQaError> {
        let _ = (image_base64, mime_type);
        self.generate(system, user).await
    }
}

/// Maximum number of attempts (including the first) for a rate-limited
/// request before giving up.
pub(crate) const MAX_RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Runs `attempt` up to [`MAX_RATE_LIMIT_ATTEMPTS`] times, retrying only
/// when it reports a rate limit (`retry_after` is `Some`). Backoff is
/// `retry_after` when the provider gave one (e.g. a `Retry-After` header),
/// else `5s * (attempt_number + 1)`.
pub(crate) async fn with_rate_limit_retry<F, Fut>(mut attempt: F) -> Result<String, PromptQaError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, RateLimited>>,
{
    for attempt_number in 0..MAX_RATE_LIMIT_ATTEMPTS {
        match attempt().await {
            Ok(text) => return Ok(text),
            Err(RateLimited::Yes { retry_after }) if attempt_number + 1 < MAX_RATE_LIMIT_ATTEMPTS => {
                let backoff = retry_after.unwrap_or_else(|| std::time::Duration::from_secs(5 * (attempt_number as u64 + 1)));
                tracing::warn!(attempt = attempt_number, backoff_ms = backoff.as_millis() as u64, "llm rate limited, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(RateLimited::Yes { .. }) => {
                return Err(PromptQaError::llm("rate limited after 3 attempts"));
            }
            Err(RateLimited::No(message)) => return Err(PromptQaError::llm(message)),
        }
    }
    Err(PromptQaError::llm("rate limited after 3 attempts"))
}

/// Outcome of one provider HTTP attempt, distinguishing a retryable rate
/// limit from any other transport/parse failure.
pub(crate) enum RateLimited {
    Yes { retry_after: Option<std::time::Duration> },
    No(String),
}

/// Builds the concrete client named by [`crate::config::LlmProviderKind`].
pub fn build_client(
    provider: crate::config::LlmProviderKind,
    model: Option<&str>,
) -> Result<Box<dyn LlmClient>, PromptQaError> {
    use crate::config::LlmProviderKind;

    match provider {
        LlmProviderKind::Anthropic => {
            let api_key = std::env::var("ANTHROPIC_API_KEY")
                .map_err(|_| PromptQaError::config("ANTHROPIC_API_KEY is not set"))?;
            let model = model.map(str::to_string).or_else(|| std::env::var("PROMPTQA_MODEL").ok());
            Ok(Box::new(AnthropicClient::new(api_key, model)?))
        }
        LlmProviderKind::Openai => {
            let api_key =
                std::env::var("OPENAI_API_KEY").map_err(|_| PromptQaError::config("OPENAI_API_KEY is not set"))?;
            let model = model.map(str::to_string).or_else(|| std::env::var("LLM_MODEL").ok());
            Ok(Box::new(OpenAiClient::new(api_key, model)?))
        }
        LlmProviderKind::Mock => Ok(Box::new(MockLlmClient::default())),
    }
}
