//! Core graph data structures

mod edge;
mod node;

pub use edge::{Edge, EdgeId};
pub use node::{Node, NodeId, NodeKind};

use serde::{Deserialize, Serialize};

/// A complete concept graph: the node/edge structure representing a text's
/// hierarchical ideas.
///
/// Owned by one pipeline invocation; not mutated after merging completes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty graph, the soft-failure result for a chunk.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Number of root-kind nodes. Exactly one after a merge of any
    /// non-empty input.
    pub fn root_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.kind.is_root()).count()
    }

    /// Look up a node by id.
    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Whether an edge with the given endpoints exists.
    pub fn has_edge(&self, source: &NodeId, target: &NodeId) -> bool {
        self.edges
            .iter()
            .any(|e| &e.source == source && &e.target == target)
    }
}
