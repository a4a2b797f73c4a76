//! Chunk graph extraction via the generation service.
//!
//! Sends one chunk (or its summary) to the service under a strict-JSON
//! instruction contract, locates the payload inside the raw reply, and
//! rewrites every identifier to a run-scoped unique value. The service only
//! ever sees one chunk, so it happily reuses ids like `node1` in every
//! reply — the remap step is what makes cross-chunk merging possible.
//!
//! A chunk the service mangles degrades to an empty graph; it never aborts
//! the run.

use crate::graph::{ConceptGraph, Edge, EdgeId, Node, NodeId, NodeKind};
use crate::llm::GenerationClient;
use crate::pipeline::invoker::{self, Invocation, RetryPolicy};
use crate::pipeline::{Chunk, PipelineError};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Instruction contract for graph extraction. The service must return
/// strict JSON with `nodes` and `edges`, one root node, and `root`/`sub`/
/// `detail` kinds.
const GRAPH_PROMPT: &str = r#"You are a mindmap generator. Based on the following text, create a JSON mindmap with "nodes" and "edges".

Requirements:
- Each node must include:
  - id (unique)
  - type ("root" for the central idea, "sub" for a direct child of root, "detail" for lower levels)
  - data: {"label": "Heading of the node", "content": "One-line description of the node"}
- Each edge must include id, source (node id), and target (node id).

Rules:
- Return strict JSON ONLY, no explanations, comments, or extra text.
- Exactly one node of type "root".
- All node and edge ids must be unique within the reply.
- content must be a non-empty one-line summary of the node label based on the text.
- Do not include children arrays; express hierarchy through edges only.

Text:
"#;

/// Raw wire shape of one chunk's payload, exactly as the service emits it.
/// Deserialization is tolerant: missing arrays become empty, missing data
/// fields become empty strings, unknown kinds degrade to detail.
#[derive(Debug, Deserialize)]
struct RawChunkGraph {
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    data: RawNodeData,
}

#[derive(Debug, Default, Deserialize)]
struct RawNodeData {
    #[serde(default)]
    label: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    source: String,
    target: String,
    #[serde(default)]
    relation: Option<String>,
}

/// Extracts a small concept graph from one chunk of text.
#[derive(Clone)]
pub struct ChunkGraphExtractor {
    client: Arc<dyn GenerationClient>,
    policy: RetryPolicy,
}

impl ChunkGraphExtractor {
    pub fn new(client: Arc<dyn GenerationClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Extract a graph from `chunk_text`, scoping all ids by `chunk_index`.
    ///
    /// Soft failures (malformed reply, missing or unparseable payload)
    /// return an empty graph. Only credential failures and exhausted
    /// retries propagate.
    pub async fn extract(
        &self,
        chunk_text: &str,
        chunk_index: usize,
    ) -> Result<ConceptGraph, PipelineError> {
        if chunk_text.trim().is_empty() {
            return Ok(ConceptGraph::empty());
        }

        let prompt = format!("{}{}", GRAPH_PROMPT, chunk_text);
        let reply = invoker::invoke("extract-graph", &self.policy, || {
            self.client.generate(&prompt)
        })
        .await?;

        let reply = match reply {
            Invocation::Ok(reply) => reply,
            Invocation::Soft => return Ok(ConceptGraph::empty()),
        };

        let payload = match locate_payload(&reply.content) {
            Some(payload) => payload,
            None => {
                warn!(chunk_index, "no JSON payload in reply, dropping chunk");
                return Ok(ConceptGraph::empty());
            }
        };

        let raw: RawChunkGraph = match serde_json::from_str(payload) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(chunk_index, %error, "payload parse failed, dropping chunk");
                return Ok(ConceptGraph::empty());
            }
        };

        debug!(
            chunk_index,
            nodes = raw.nodes.len(),
            edges = raw.edges.len(),
            "chunk extracted"
        );
        Ok(remap_ids(raw, chunk_index))
    }

    /// Extract all chunks independently and concurrently (no running
    /// summary), bounded by `concurrency`. Results come back in chunk
    /// order; a fatal failure on any chunk aborts the lot.
    pub async fn extract_all(
        &self,
        chunks: &[Chunk],
        concurrency: usize,
    ) -> Result<Vec<ConceptGraph>, PipelineError> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks: JoinSet<(usize, Result<ConceptGraph, PipelineError>)> = JoinSet::new();

        for chunk in chunks {
            let extractor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let text = chunk.text.clone();
            let index = chunk.index;
            tasks.spawn(async move {
                // Closing the semaphore is not part of this flow, so the
                // acquire can only fail if the runtime is shutting down.
                let _permit = semaphore.acquire().await;
                (index, extractor.extract(&text, index).await)
            });
        }

        let mut graphs: Vec<Option<ConceptGraph>> = vec![None; chunks.len()];
        while let Some(joined) = tasks.join_next().await {
            let (index, outcome) =
                joined.map_err(|e| PipelineError::Internal(format!("extract task: {}", e)))?;
            graphs[index] = Some(outcome?);
        }

        Ok(graphs.into_iter().flatten().collect())
    }
}

/// Locate the outermost `{`…`}` block inside a raw reply.
///
/// The service is asked for strict JSON but routinely wraps it in prose.
fn locate_payload(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&reply[start..=end])
}

/// Rewrite chunk-local identifiers to run-scoped unique values.
///
/// Node ids become `c{chunk}-n{ordinal}`; edge ids become
/// `c{chunk}-e{ordinal}`; edge endpoints are remapped through the node
/// substitution. An endpoint the service never declared as a node keeps
/// its original id — recognized upstream sloppiness, not an error.
fn remap_ids(raw: RawChunkGraph, chunk_index: usize) -> ConceptGraph {
    let mut graph = ConceptGraph::new();
    let mut substitution: HashMap<String, NodeId> = HashMap::new();

    for (ordinal, node) in raw.nodes.into_iter().enumerate() {
        let new_id = NodeId::scoped(chunk_index, ordinal);
        substitution.insert(node.id, new_id.clone());
        graph.nodes.push(Node::new(
            new_id,
            NodeKind::parse(&node.kind),
            node.data.label,
            node.data.content,
        ));
    }

    for (ordinal, edge) in raw.edges.into_iter().enumerate() {
        let source = substitution
            .get(&edge.source)
            .cloned()
            .unwrap_or_else(|| NodeId::from_string(edge.source));
        let target = substitution
            .get(&edge.target)
            .cloned()
            .unwrap_or_else(|| NodeId::from_string(edge.target));
        let mut rewritten = Edge::new(EdgeId::scoped(chunk_index, ordinal), source, target);
        rewritten.relation = edge.relation;
        graph.edges.push(rewritten);
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationError, MockClient};

    fn chunk_payload() -> &'static str {
        r#"{
            "nodes": [
                {"id": "node1", "type": "root", "data": {"label": "Topic", "content": "The topic"}},
                {"id": "node2", "type": "sub", "data": {"label": "Idea", "content": "An idea"}},
                {"id": "node3", "type": "branch", "data": {"label": "Leaf", "content": "A leaf"}}
            ],
            "edges": [
                {"id": "edge1", "source": "node1", "target": "node2"},
                {"id": "edge2", "source": "node2", "target": "node3"},
                {"id": "edge3", "source": "node2", "target": "ghost"}
            ]
        }"#
    }

    fn extractor(client: MockClient) -> ChunkGraphExtractor {
        ChunkGraphExtractor::new(
            Arc::new(client),
            RetryPolicy {
                max_retries: 0,
                backoff: std::time::Duration::from_millis(1),
            },
        )
    }

    // --- Scenario: ids are remapped and scoped by chunk index ---

    #[tokio::test]
    async fn remaps_node_and_edge_ids() {
        let client = MockClient::new().push_reply(chunk_payload());
        let graph = extractor(client).extract("some chunk", 2).await.unwrap();

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[0].id.as_str(), "c2-n0");
        assert_eq!(graph.nodes[1].id.as_str(), "c2-n1");
        assert_eq!(graph.edges[0].id.as_str(), "c2-e0");

        // Endpoints follow the node substitution.
        assert!(graph.has_edge(&NodeId::scoped(2, 0), &NodeId::scoped(2, 1)));
        assert!(graph.has_edge(&NodeId::scoped(2, 1), &NodeId::scoped(2, 2)));
    }

    #[tokio::test]
    async fn unknown_endpoint_keeps_original_id() {
        let client = MockClient::new().push_reply(chunk_payload());
        let graph = extractor(client).extract("some chunk", 0).await.unwrap();

        let ghost_edge = &graph.edges[2];
        assert_eq!(ghost_edge.target.as_str(), "ghost");
    }

    #[tokio::test]
    async fn unknown_node_kind_degrades_to_detail() {
        let client = MockClient::new().push_reply(chunk_payload());
        let graph = extractor(client).extract("some chunk", 0).await.unwrap();
        assert_eq!(graph.nodes[2].kind, NodeKind::Detail);
    }

    // --- Scenario: payload is found inside a chatty reply ---

    #[tokio::test]
    async fn locates_payload_amid_prose() {
        let wrapped = format!("Here is your mindmap:\n{}\nHope that helps!", chunk_payload());
        let client = MockClient::new().push_reply(wrapped);
        let graph = extractor(client).extract("some chunk", 0).await.unwrap();
        assert_eq!(graph.nodes.len(), 3);
    }

    // --- Scenario: a mangled chunk degrades to an empty graph ---

    #[tokio::test]
    async fn unparseable_payload_yields_empty_graph() {
        let client = MockClient::new().push_reply("{not valid json]");
        let graph = extractor(client).extract("some chunk", 0).await.unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn reply_without_payload_yields_empty_graph() {
        let client = MockClient::new().push_reply("I could not build a mindmap for that.");
        let graph = extractor(client).extract("some chunk", 0).await.unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn malformed_client_failure_yields_empty_graph() {
        let client = MockClient::new()
            .push_error(GenerationError::Malformed("response parse error".into()));
        let graph = extractor(client).extract("some chunk", 0).await.unwrap();
        assert!(graph.is_empty());
    }

    #[tokio::test]
    async fn empty_chunk_skips_the_service_call() {
        let client = MockClient::new();
        let ext = extractor(client);
        let graph = ext.extract("   \n", 0).await.unwrap();
        assert!(graph.is_empty());
    }

    // --- Scenario: credential failure aborts instead of degrading ---

    #[tokio::test]
    async fn credential_failure_propagates() {
        let client = MockClient::new().push_error(GenerationError::Service {
            status: 401,
            message: "unauthorized".into(),
        });
        let err = extractor(client).extract("some chunk", 0).await.unwrap_err();
        assert!(matches!(err, PipelineError::Credential(_)));
    }

    // --- Scenario: concurrent extraction preserves chunk order ---

    #[tokio::test]
    async fn extract_all_returns_graphs_in_chunk_order() {
        let payload_a = r#"{"nodes":[{"id":"n","type":"root","data":{"label":"A","content":"a"}}],"edges":[]}"#;
        let payload_b = r#"{"nodes":[{"id":"n","type":"root","data":{"label":"B","content":"b"}}],"edges":[]}"#;
        // Concurrency 1 keeps the mock's reply order aligned with chunks.
        let client = MockClient::new().push_reply(payload_a).push_reply(payload_b);
        let ext = extractor(client);

        let chunks = vec![Chunk::new(0, "first"), Chunk::new(1, "second")];
        let graphs = ext.extract_all(&chunks, 1).await.unwrap();

        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].nodes[0].label, "A");
        assert_eq!(graphs[0].nodes[0].id.as_str(), "c0-n0");
        assert_eq!(graphs[1].nodes[0].label, "B");
        assert_eq!(graphs[1].nodes[0].id.as_str(), "c1-n0");
    }
}
