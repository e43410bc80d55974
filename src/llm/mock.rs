use async_trait::async_trait;
use parking_lot::Mutex;

use super::LlmClient;
use crate::errors::PromptQaError;

/// Cycles through a fixed list of canned responses, one per call, and
/// repeats the last response forever once the list is exhausted. Used by
/// `LLM_PROVIDER=mock` and by the end-to-end test scenarios.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Vec<String>,
    cursor: Mutex<usize>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<String>) -> Self {
        Self { responses, cursor: Mutex::new(0) }
    }

    fn next_response(&self) -> String {
        if self.responses.is_empty() {
            return String::new();
        }
        let mut cursor = self.cursor.lock();
        let response = self.responses[(*cursor).min(self.responses.len() - 1)].clone();
        if *cursor + 1 < self.responses.len() {
            *cursor += 1;
        }
        response
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String, PromptQaError> {
        Ok(self.next_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cycles_then_repeats_last_response() {
        let client = MockLlmClient::new(vec!["a".into(), "b".into()]);
        assert_eq!(client.generate("", "").await.unwrap(), "a");
        assert_eq!(client.generate("", "").await.unwrap(), "b");
        assert_eq!(client.generate("", "").await.unwrap(), "b");
    }
}
