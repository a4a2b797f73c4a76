//! Mindgraph: Concept Graph Engine
//!
//! Turns arbitrary long-form text into a hierarchical concept graph
//! ("mindmap") using an external text-generation service: segmentation,
//! progressive summarization, per-chunk graph extraction, cross-chunk
//! merging, resilient service invocation, and a short-lived result cache.
//!
//! # Core Concepts
//!
//! - **Nodes**: root / sub / detail concepts with a label and a one-line
//!   description
//! - **Edges**: directed structural links between concepts
//! - **Chunks**: bounded slices of source text, summarized sequentially so
//!   each chunk is extracted with memory of everything before it
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mindgraph::{HttpClientConfig, HttpGenerationClient, MindmapService};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpGenerationClient::new(HttpClientConfig::default())?;
//! let service = MindmapService::new(Arc::new(client));
//! let mindmap = service.generate_graph("Long-form text goes here.").await?;
//! println!("{} nodes under '{}'", mindmap.graph.nodes.len(), mindmap.title);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod graph;
pub mod http_llm;
pub mod llm;
pub mod pipeline;
pub mod source;

pub use api::{Mindmap, MindmapService};
pub use cache::{CachedMindmap, ResultCache};
pub use graph::{ConceptGraph, Edge, EdgeId, Node, NodeId, NodeKind};
pub use http_llm::{HttpClientConfig, HttpGenerationClient};
pub use llm::{GenerationClient, GenerationError, MockClient, TextReply};
pub use pipeline::{
    Chunk, PipelineConfig, PipelineError, ProgressEvent, ProgressPayload, Stage,
};
pub use source::{ContentSource, FileSource, LiteralSource, SourceError, SourceText};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
