//! HTTP generation client — OpenAI-compatible chat completions.

use crate::llm::{GenerationClient, GenerationError, TextReply};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the HTTP generation client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Chat completions endpoint URL
    pub endpoint: String,
    /// Model identifier sent with each request
    pub model: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Request body for chat completions.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Response: choices[0].message.content.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Generation client that talks to an OpenAI-compatible endpoint.
pub struct HttpGenerationClient {
    http: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpGenerationClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Unreachable(e.to_string()))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(&self, prompt: &str) -> Result<TextReply, GenerationError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let mut request = self.http.post(&self.config.endpoint).json(&body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            // The status code lands in the message so the invoker can
            // classify 401/429 from the description alone.
            let message = match status.as_u16() {
                401 | 403 => format!("unauthorized: {}", truncate(&text, 200)),
                429 => format!("rate limit exceeded: {}", truncate(&text, 200)),
                _ => truncate(&text, 200),
            };
            return Err(GenerationError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::Malformed(format!("response parse error: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("reply has no content".to_string()))?;

        Ok(TextReply::new(content))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}
