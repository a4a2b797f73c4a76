//! Generation service client — the pipeline's only upstream dependency.
//!
//! Defines the client trait and reply type for calling the text-generation
//! service. Two implementations:
//! - `HttpGenerationClient`: OpenAI-compatible chat completions (production)
//! - `MockClient`: returns scripted replies in order (testing)
//!
//! The trait abstracts over transport so the pipeline never depends on how
//! the service is reached. Failures carry a description string; the resilient
//! invoker classifies them from signals like "401" or "rate limit" alone.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Successful reply from the generation service.
///
/// The service promises nothing beyond "has text content"; everything else
/// (payload location, parsing) happens downstream.
#[derive(Debug, Clone)]
pub struct TextReply {
    /// The raw reply text, possibly wrapping a structured payload.
    pub content: String,
}

impl TextReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Errors from generation client operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    /// The service could not be reached at all.
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// The service answered with a failure status.
    #[error("service error {status}: {message}")]
    Service { status: u16, message: String },

    /// The service replied but the reply could not be interpreted.
    #[error("malformed reply: {0}")]
    Malformed(String),
}

/// Client trait for calling the generation service.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Send a prompt and return the raw text reply.
    async fn generate(&self, prompt: &str) -> Result<TextReply, GenerationError>;
}

/// Mock client for testing — pops scripted outcomes in call order and records
/// every prompt it receives.
#[derive(Default)]
pub struct MockClient {
    script: Mutex<VecDeque<Result<TextReply, GenerationError>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a successful reply for the next unscripted call.
    pub fn push_reply(self, content: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(TextReply::new(content)));
        self
    }

    /// Script a failure for the next unscripted call.
    pub fn push_error(self, error: GenerationError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    /// All prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationClient for MockClient {
    async fn generate(&self, prompt: &str) -> Result<TextReply, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Err(GenerationError::Unreachable(
                "mock script exhausted".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_replays_script_in_order() {
        let client = MockClient::new()
            .push_reply("first")
            .push_error(GenerationError::Service {
                status: 429,
                message: "rate limit exceeded".to_string(),
            })
            .push_reply("second");

        assert_eq!(client.generate("a").await.unwrap().content, "first");
        let err = client.generate("b").await.unwrap_err();
        assert!(err.to_string().contains("429"));
        assert_eq!(client.generate("c").await.unwrap().content, "second");
    }

    #[tokio::test]
    async fn mock_records_prompts() {
        let client = MockClient::new().push_reply("ok");
        client.generate("the prompt").await.unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(client.prompts(), vec!["the prompt".to_string()]);
    }

    #[tokio::test]
    async fn exhausted_script_reports_unreachable() {
        let client = MockClient::new();
        let err = client.generate("anything").await.unwrap_err();
        assert!(matches!(err, GenerationError::Unreachable(_)));
    }
}
