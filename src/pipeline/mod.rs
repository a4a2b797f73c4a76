//! Text → concept-graph pipeline.
//!
//! The pipeline turns raw text into a single, deduplicated concept graph:
//!
//! - **segmenter**: splits text into bounded chunks at natural boundaries
//! - **invoker**: wraps every generation call with retry/backoff and
//!   failure classification
//! - **extractor**: turns one chunk (or its summary) into a small graph
//!   with run-scoped unique ids
//! - **summarizer**: folds chunks into a running summary, sequentially
//! - **merger**: deduplicates and stitches per-chunk graphs into one
//! - **progress**: ordered stage events for streaming callers
//!
//! Soft failures (a chunk the service mangled) degrade that chunk to an
//! empty graph; fatal failures (dead credentials, exhausted retries)
//! propagate to the pipeline boundary.

pub mod extractor;
pub mod invoker;
pub mod merger;
pub mod progress;
pub mod segmenter;
pub mod summarizer;

pub use extractor::ChunkGraphExtractor;
pub use invoker::{classify, FailureClass, Invocation, RetryPolicy};
pub use merger::merge_chunk_graphs;
pub use progress::{ProgressEvent, ProgressPayload, Stage, StageTracker};
pub use segmenter::{segment, Chunk};
pub use summarizer::ProgressiveSummarizer;

use std::time::Duration;

/// Errors that abort a pipeline run.
///
/// Soft failures never appear here — they are absorbed at the extractor
/// boundary and reduce graph completeness instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Credentials for the generation service are dead. Never retried.
    #[error("generation credentials rejected: {0}")]
    Credential(String),

    /// Retries were exhausted on a transient or rate-limit failure.
    #[error("generation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The content source could not produce input text.
    #[error(transparent)]
    Source(#[from] crate::source::SourceError),

    /// A pipeline task failed outside the generation path.
    #[error("internal pipeline error: {0}")]
    Internal(String),
}

/// Tunables for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum characters per chunk
    pub max_chunk_chars: usize,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Delay between retry attempts
    pub backoff: Duration,
    /// TTL for cached results
    pub cache_ttl: Duration,
    /// Carry a running summary across chunks (sequential) rather than
    /// extracting each chunk independently (concurrent)
    pub progressive: bool,
    /// Concurrent extractions in non-progressive mode
    pub extract_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 3000,
            max_retries: 3,
            backoff: Duration::from_secs(2),
            cache_ttl: Duration::from_secs(3600),
            progressive: true,
            extract_concurrency: 4,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chunk_chars(mut self, max_chars: usize) -> Self {
        self.max_chunk_chars = max_chars;
        self
    }

    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Extract chunks independently and concurrently, without the running
    /// summary.
    pub fn flat(mut self) -> Self {
        self.progressive = false;
        self
    }

    /// The retry policy slice of this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: self.backoff,
        }
    }
}
