//! Progressive summarization — the memory-carrying pass over the chunks.
//!
//! Chunks are processed strictly in order: each summarization call sees the
//! running summary of everything before it plus the current chunk, and its
//! output becomes the running summary for the next chunk. That causal chain
//! is why this pass cannot skip a hard failure — losing step *i* would
//! silently corrupt step *i+1*.
//!
//! A soft-failed summary degrades to the empty string so the pipeline
//! keeps moving; the extractor then sees an empty input for that chunk and
//! produces an empty graph for it.

use crate::graph::ConceptGraph;
use crate::llm::GenerationClient;
use crate::pipeline::extractor::ChunkGraphExtractor;
use crate::pipeline::invoker::{self, RetryPolicy};
use crate::pipeline::merger::merge_chunk_graphs;
use crate::pipeline::{Chunk, PipelineError};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Instruction contract for folding one chunk into the running summary.
const SUMMARY_PROMPT: &str = "You are a progressive summarizer. Combine the summary so far with the new text into one updated summary of 3 concise bullet points (each on its own line).\n\nSummary so far:\n";

/// Sequential, stateful summarize-then-extract pass.
pub struct ProgressiveSummarizer {
    client: Arc<dyn GenerationClient>,
    extractor: ChunkGraphExtractor,
    policy: RetryPolicy,
}

impl ProgressiveSummarizer {
    pub fn new(client: Arc<dyn GenerationClient>, policy: RetryPolicy) -> Self {
        let extractor = ChunkGraphExtractor::new(Arc::clone(&client), policy);
        Self {
            client,
            extractor,
            policy,
        }
    }

    /// Fold every chunk into a running summary, extract a graph per
    /// summary, and merge the results.
    ///
    /// Fatal failures (credentials, exhausted retries) abort the whole
    /// pass; soft failures degrade the affected chunk only.
    #[instrument(skip_all, fields(chunks = chunks.len()))]
    pub async fn summarize_and_extract(
        &self,
        chunks: &mut [Chunk],
    ) -> Result<ConceptGraph, PipelineError> {
        let mut chunk_graphs = Vec::with_capacity(chunks.len());
        let mut previous_summary = String::new();

        for chunk in chunks.iter_mut() {
            let summary = self
                .summarize_step(&previous_summary, &chunk.text)
                .await?
                .unwrap_or_default();

            debug!(
                chunk = chunk.index,
                summary_chars = summary.chars().count(),
                "chunk summarized"
            );

            let graph = self.extractor.extract(&summary, chunk.index).await?;
            chunk_graphs.push(graph);

            chunk.summary = Some(summary.clone());
            previous_summary = summary;
        }

        Ok(merge_chunk_graphs(chunk_graphs))
    }

    /// One summarization call: `(previous_summary, chunk_text)` → summary.
    /// Returns `None` on a soft failure.
    async fn summarize_step(
        &self,
        previous_summary: &str,
        chunk_text: &str,
    ) -> Result<Option<String>, PipelineError> {
        let prompt = format!(
            "{}{}\n\nNew text:\n{}\n\nBullets:",
            SUMMARY_PROMPT, previous_summary, chunk_text
        );

        let reply = invoker::invoke("summarize-chunk", &self.policy, || {
            self.client.generate(&prompt)
        })
        .await?;

        Ok(reply.into_option().map(|r| r.content.trim().to_string()))
    }
}
