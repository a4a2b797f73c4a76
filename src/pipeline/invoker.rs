//! Resilient invocation of the generation service.
//!
//! Every call into the service goes through [`invoke`], which classifies
//! each failure from its description string and applies the policy table:
//!
//! | class        | signals                                   | handling              |
//! |--------------|-------------------------------------------|-----------------------|
//! | credential   | "401", "unauthorized", "token expired",   | fail immediately      |
//! |              | "invalid api key"                         |                       |
//! | rate-limited | "429", "rate limit"                       | retry with delay      |
//! | malformed    | "parse", "malformed", "unexpected output" | soft: empty result    |
//! | transient    | everything else                           | retry with delay      |
//!
//! The policy is an explicit outcome type consumed by a bounded loop, not
//! exception-driven control flow, so each row is testable directly.

use crate::llm::GenerationError;
use crate::pipeline::PipelineError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry bounds for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Classification of a single failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Unauthorized or expired credentials. A dead credential retried
    /// wastes quota and time, so this is never retried.
    Credential,
    /// The service throttled the call.
    RateLimited,
    /// The service replied but its content breaks the expected contract.
    Malformed,
    /// Anything else; assumed transient.
    Transient,
}

impl FailureClass {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::RateLimited => "rate-limited",
            Self::Malformed => "malformed",
            Self::Transient => "transient",
        }
    }
}

/// Classify a failure from its description string.
///
/// The invoker depends only on signals present in the message, not on the
/// error's type, because the service client is free to wrap transport
/// errors however it likes.
pub fn classify(message: &str) -> FailureClass {
    let msg = message.to_lowercase();

    if msg.contains("401")
        || msg.contains("unauthorized")
        || msg.contains("token expired")
        || msg.contains("invalid api key")
    {
        return FailureClass::Credential;
    }
    if msg.contains("429") || msg.contains("rate limit") {
        return FailureClass::RateLimited;
    }
    if msg.contains("parse") || msg.contains("malformed") || msg.contains("unexpected output") {
        return FailureClass::Malformed;
    }
    FailureClass::Transient
}

/// Outcome of a resilient invocation that did not abort the pipeline.
#[derive(Debug)]
pub enum Invocation<T> {
    /// The call succeeded.
    Ok(T),
    /// The call soft-failed (malformed output); the caller substitutes an
    /// empty result so one bad chunk does not abort the whole run.
    Soft,
}

impl<T> Invocation<T> {
    /// Unwrap into an `Option`, mapping `Soft` to `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Ok(value) => Some(value),
            Self::Soft => None,
        }
    }
}

/// Invoke `operation` with retry and failure classification.
///
/// Runs one initial attempt plus at most `policy.max_retries` retries.
/// Credential failures surface immediately; malformed output returns
/// [`Invocation::Soft`]; rate-limit and transient failures retry with
/// `policy.backoff` between attempts until retries are exhausted.
pub async fn invoke<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<Invocation<T>, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let attempts = policy.max_retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => {
                debug!(label, attempt, "generation call succeeded");
                return Ok(Invocation::Ok(value));
            }
            Err(error) => {
                let message = error.to_string();
                let class = classify(&message);

                match class {
                    FailureClass::Credential => {
                        warn!(
                            label,
                            attempt,
                            class = class.as_str(),
                            error = %message,
                            "credential failure, not retrying"
                        );
                        return Err(PipelineError::Credential(message));
                    }
                    FailureClass::Malformed => {
                        debug!(
                            label,
                            attempt,
                            class = class.as_str(),
                            error = %message,
                            "malformed output, degrading to empty result"
                        );
                        return Ok(Invocation::Soft);
                    }
                    FailureClass::RateLimited | FailureClass::Transient => {
                        warn!(
                            label,
                            attempt,
                            attempts,
                            class = class.as_str(),
                            delay_ms = policy.backoff.as_millis() as u64,
                            error = %message,
                            "generation call failed"
                        );
                        last_error = message;
                        if attempt < attempts {
                            tokio::time::sleep(policy.backoff).await;
                        }
                    }
                }
            }
        }
    }

    Err(PipelineError::RetriesExhausted {
        attempts,
        last_error,
    })
}
