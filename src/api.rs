//! Transport-independent API layer.
//!
//! `MindmapService` is the single entry point for all consumer-facing
//! operations. Callers (CLI, embedding) go through `generate_graph` /
//! `generate_graph_streaming` — they never reach into the pipeline stages
//! directly.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::cache::{CachedMindmap, ResultCache};
use crate::graph::ConceptGraph;
use crate::llm::GenerationClient;
use crate::pipeline::{
    invoker, merge_chunk_graphs, segment, ChunkGraphExtractor, PipelineConfig, PipelineError,
    ProgressEvent, ProgressiveSummarizer, Stage, StageTracker,
};
use crate::source::{ContentSource, LiteralSource};

/// Instruction contract for title generation.
const TITLE_PROMPT: &str = "You are a text summarizer. Generate a short, descriptive title for the following text.\n\nRules:\n- Return only a concise title (5 words max) summarizing the main idea.\n- Do not include any punctuation, explanations, or quotes.\n\nText:\n";

/// The finished product of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Mindmap {
    pub graph: ConceptGraph,
    pub title: String,
}

/// Where progress events go. An abandoned streaming receiver makes sends
/// fail silently; the run itself carries on.
enum EventSink {
    Silent,
    Channel(mpsc::Sender<ProgressEvent>),
}

impl EventSink {
    async fn emit(&self, event: ProgressEvent) {
        if let Self::Channel(tx) = self {
            let _ = tx.send(event).await;
        }
    }
}

/// Single entry point for turning source text into a concept graph.
///
/// One instance serves many concurrent requests; each request runs in its
/// own task with its own pipeline state. The only shared mutable state is
/// the result cache, which is atomic per key.
#[derive(Clone)]
pub struct MindmapService {
    client: Arc<dyn GenerationClient>,
    cache: Arc<ResultCache>,
    config: PipelineConfig,
}

impl MindmapService {
    /// Create a service with default tunables.
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self::with_config(client, PipelineConfig::default())
    }

    /// Create a service with explicit tunables.
    pub fn with_config(client: Arc<dyn GenerationClient>, config: PipelineConfig) -> Self {
        let cache = Arc::new(ResultCache::new(config.cache_ttl));
        Self {
            client,
            cache,
            config,
        }
    }

    /// The shared result cache.
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Generate a mindmap from literal text.
    pub async fn generate_graph(&self, text: &str) -> Result<Mindmap, PipelineError> {
        let source = LiteralSource::new(text);
        self.run_reported(&source, &EventSink::Silent).await
    }

    /// Generate a mindmap from any content source.
    pub async fn generate_from_source(
        &self,
        source: &dyn ContentSource,
    ) -> Result<Mindmap, PipelineError> {
        self.run_reported(source, &EventSink::Silent).await
    }

    /// Generate a mindmap from literal text, streaming stage events.
    ///
    /// The returned channel yields one event per completed stage and ends
    /// with a terminal `done` (graph + title) or `error` event.
    pub fn generate_graph_streaming(
        &self,
        text: impl Into<String>,
    ) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(16);
        let service = self.clone();
        let source = LiteralSource::new(text);
        tokio::spawn(async move {
            // Failure already surfaced to the caller as an `error` event.
            let _ = service.run_reported(&source, &EventSink::Channel(tx)).await;
        });
        rx
    }

    /// Run the pipeline and guarantee a terminal event either way.
    async fn run_reported(
        &self,
        source: &dyn ContentSource,
        sink: &EventSink,
    ) -> Result<Mindmap, PipelineError> {
        let mut tracker = StageTracker::new(Uuid::new_v4());
        match self.run(source, &mut tracker, sink).await {
            Ok(mindmap) => {
                let event = tracker
                    .finish(mindmap.graph.clone(), mindmap.title.clone())
                    .map_err(|e| PipelineError::Internal(e.to_string()))?;
                sink.emit(event).await;
                Ok(mindmap)
            }
            Err(error) => {
                if let Ok(event) = tracker.fail(error.to_string()) {
                    sink.emit(event).await;
                }
                Err(error)
            }
        }
    }

    /// The pipeline proper: cache-check → fetch → title → segment →
    /// summarize+extract → merge → cache-store.
    #[instrument(skip_all, fields(request_id = %tracker.request_id()))]
    async fn run(
        &self,
        source: &dyn ContentSource,
        tracker: &mut StageTracker,
        sink: &EventSink,
    ) -> Result<Mindmap, PipelineError> {
        self.advance(tracker, sink, Stage::CacheCheck).await?;
        let key = ResultCache::key_for(&source.identifier());
        if let Some(hit) = self.cache.get(&key) {
            info!(key = %key, "cache hit");
            return Ok(Mindmap {
                graph: hit.graph,
                title: hit.title,
            });
        }

        self.advance(tracker, sink, Stage::FetchText).await?;
        let fetched = source.fetch_text().await?;

        self.advance(tracker, sink, Stage::Title).await?;
        let title = match fetched.title_hint {
            Some(hint) => hint,
            None => self.generate_title(&fetched.text).await?,
        };

        self.advance(tracker, sink, Stage::Segment).await?;
        let mut chunks = segment(&fetched.text, self.config.max_chunk_chars);
        info!(chunks = chunks.len(), "text segmented");

        self.advance(tracker, sink, Stage::SummarizeExtract).await?;
        let policy = self.config.retry_policy();
        let graph = if self.config.progressive {
            ProgressiveSummarizer::new(Arc::clone(&self.client), policy)
                .summarize_and_extract(&mut chunks)
                .await?
        } else {
            let extractor = ChunkGraphExtractor::new(Arc::clone(&self.client), policy);
            let graphs = extractor
                .extract_all(&chunks, self.config.extract_concurrency)
                .await?;
            merge_chunk_graphs(graphs)
        };

        self.advance(tracker, sink, Stage::CacheStore).await?;
        self.cache.set(
            key,
            CachedMindmap {
                graph: graph.clone(),
                title: title.clone(),
                source_text: fetched.text,
            },
        );

        Ok(Mindmap { graph, title })
    }

    async fn advance(
        &self,
        tracker: &mut StageTracker,
        sink: &EventSink,
        stage: Stage,
    ) -> Result<(), PipelineError> {
        let event = tracker
            .advance(stage)
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        sink.emit(event).await;
        Ok(())
    }

    /// Generate a short title, falling back to the first line of the text
    /// when the service soft-fails.
    async fn generate_title(&self, text: &str) -> Result<String, PipelineError> {
        if text.trim().is_empty() {
            return Ok(fallback_title(text));
        }

        let prompt = format!("{}{}", TITLE_PROMPT, text);
        let policy = self.config.retry_policy();
        let reply = invoker::invoke("generate-title", &policy, || {
            self.client.generate(&prompt)
        })
        .await?;

        Ok(match reply.into_option() {
            Some(reply) if !reply.content.trim().is_empty() => reply.content.trim().to_string(),
            _ => fallback_title(text),
        })
    }
}

/// First non-empty line of the text, truncated; "Untitled" as a last resort.
fn fallback_title(text: &str) -> String {
    const MAX_TITLE_CHARS: usize = 60;

    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| {
            if line.chars().count() > MAX_TITLE_CHARS {
                let cut: String = line.chars().take(MAX_TITLE_CHARS).collect();
                format!("{}…", cut.trim_end())
            } else {
                line.to_string()
            }
        })
        .unwrap_or_else(|| "Untitled".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationError, MockClient};
    use std::time::Duration;

    fn config() -> PipelineConfig {
        PipelineConfig::new()
            .with_max_chunk_chars(100)
            .with_retry(0, Duration::from_millis(1))
    }

    fn graph_reply(label: &str) -> String {
        format!(
            r#"{{"nodes":[{{"id":"n1","type":"root","data":{{"label":"{}","content":"c"}}}}],"edges":[]}}"#,
            label
        )
    }

    #[test]
    fn fallback_title_takes_first_line() {
        assert_eq!(fallback_title("A study of moss\nand more"), "A study of moss");
        assert_eq!(fallback_title("\n\n  \nsecond try"), "second try");
        assert_eq!(fallback_title("   \n  "), "Untitled");
        let long = "w".repeat(100);
        assert!(fallback_title(&long).ends_with('…'));
    }

    // --- Scenario: one short text runs the whole pipeline ---

    #[tokio::test]
    async fn generate_graph_produces_titled_mindmap() {
        // Call order: title, summarize c0, extract c0.
        let client = Arc::new(
            MockClient::new()
                .push_reply("Moss Gardens")
                .push_reply("a summary")
                .push_reply(graph_reply("Moss")),
        );
        let service = MindmapService::with_config(client.clone(), config());

        let mindmap = service.generate_graph("Moss grows on stones.").await.unwrap();
        assert_eq!(mindmap.title, "Moss Gardens");
        assert_eq!(mindmap.graph.root_count(), 1);
        assert_eq!(client.call_count(), 3);
    }

    // --- Scenario: the second identical request is served from cache ---

    #[tokio::test]
    async fn identical_request_hits_cache() {
        let client = Arc::new(
            MockClient::new()
                .push_reply("Title")
                .push_reply("a summary")
                .push_reply(graph_reply("Topic")),
        );
        let service = MindmapService::with_config(client.clone(), config());

        let first = service.generate_graph("Some text.").await.unwrap();
        let calls_after_first = client.call_count();
        let second = service.generate_graph("Some text.").await.unwrap();

        assert_eq!(client.call_count(), calls_after_first, "no new service calls");
        assert_eq!(first.title, second.title);
        assert_eq!(first.graph.nodes.len(), second.graph.nodes.len());
    }

    // --- Scenario: soft-failed title falls back to the first line ---

    #[tokio::test]
    async fn soft_title_failure_uses_fallback() {
        let client = Arc::new(
            MockClient::new()
                .push_error(GenerationError::Malformed("parse".into()))
                .push_reply("a summary")
                .push_reply(graph_reply("Topic")),
        );
        let service = MindmapService::with_config(client, config());

        let mindmap = service.generate_graph("Lichen basics.\nMore text.").await.unwrap();
        assert_eq!(mindmap.title, "Lichen basics.");
    }

    // --- Scenario: a title hint from the source skips title generation ---

    #[tokio::test]
    async fn title_hint_skips_title_generation() {
        struct HintedSource;

        #[async_trait::async_trait]
        impl ContentSource for HintedSource {
            fn identifier(&self) -> String {
                "hinted".to_string()
            }

            async fn fetch_text(&self) -> Result<crate::source::SourceText, crate::source::SourceError> {
                Ok(crate::source::SourceText {
                    text: "Ferns unfurl in spring.".to_string(),
                    title_hint: Some("Fern Almanac".to_string()),
                })
            }
        }

        // Only summarize + extract are called; no title call.
        let client = Arc::new(
            MockClient::new()
                .push_reply("a summary")
                .push_reply(graph_reply("Ferns")),
        );
        let service = MindmapService::with_config(client.clone(), config());

        let mindmap = service.generate_from_source(&HintedSource).await.unwrap();
        assert_eq!(mindmap.title, "Fern Almanac");
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_text_yields_empty_graph_without_calls() {
        let client = Arc::new(MockClient::new());
        let service = MindmapService::with_config(client.clone(), config());

        let mindmap = service.generate_graph("   ").await.unwrap();
        assert!(mindmap.graph.is_empty());
        assert_eq!(mindmap.title, "Untitled");
        assert_eq!(client.call_count(), 0);
    }

    // --- Scenario: streaming emits ordered stages then done ---

    #[tokio::test]
    async fn streaming_emits_stage_sequence_and_final_payload() {
        let client = Arc::new(
            MockClient::new()
                .push_reply("Title")
                .push_reply("a summary")
                .push_reply(graph_reply("Topic")),
        );
        let service = MindmapService::with_config(client, config());

        let mut rx = service.generate_graph_streaming("Streamed text.");
        let mut stages = Vec::new();
        while let Some(event) = rx.recv().await {
            stages.push(event.stage);
            if event.stage == Stage::Done {
                match event.payload {
                    Some(crate::pipeline::ProgressPayload::Finished { graph, title }) => {
                        assert_eq!(title, "Title");
                        assert_eq!(graph.root_count(), 1);
                    }
                    other => panic!("expected finished payload, got {:?}", other),
                }
            }
        }

        assert_eq!(
            stages,
            vec![
                Stage::CacheCheck,
                Stage::FetchText,
                Stage::Title,
                Stage::Segment,
                Stage::SummarizeExtract,
                Stage::CacheStore,
                Stage::Done,
            ]
        );
    }

    // --- Scenario: a fatal failure streams a terminal error event ---

    #[tokio::test]
    async fn streaming_fatal_failure_ends_with_error_event() {
        let client = Arc::new(MockClient::new().push_error(GenerationError::Service {
            status: 401,
            message: "unauthorized".into(),
        }));
        let service = MindmapService::with_config(client, config());

        let mut rx = service.generate_graph_streaming("Doomed text.");
        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }

        let last = last.expect("at least one event");
        assert_eq!(last.stage, Stage::Error);
        match last.payload {
            Some(crate::pipeline::ProgressPayload::Failed { message }) => {
                assert!(message.contains("credentials"));
            }
            other => panic!("expected failure payload, got {:?}", other),
        }
    }
}
