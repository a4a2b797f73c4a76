//! Edge representation connecting concept nodes

use super::node::NodeId;
use serde::{Deserialize, Serialize};

/// Unique identifier for an edge.
///
/// Like node ids, edge ids are deterministic and scoped per pipeline run
/// (`c{chunk}-e{ordinal}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the canonical id for the `ordinal`-th edge of chunk `chunk`.
    pub fn scoped(chunk: usize, ordinal: usize) -> Self {
        Self(format!("c{}-e{}", chunk, ordinal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directed edge between two nodes of the concept graph.
///
/// After merging, both endpoints reference merged node ids and no two edges
/// share the same (source, target) pair. An edge whose endpoint the service
/// never declared keeps the original reference (see the merger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier
    pub id: EdgeId,
    /// Source node
    pub source: NodeId,
    /// Target node
    pub target: NodeId,
    /// Optional relationship label (e.g., "supports")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
}

impl Edge {
    /// Create a new edge.
    pub fn new(id: EdgeId, source: NodeId, target: NodeId) -> Self {
        Self {
            id,
            source,
            target,
            relation: None,
        }
    }

    /// Set the relationship label.
    pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = Some(relation.into());
        self
    }

    /// The (source, target) pair used for merge-time deduplication.
    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.source.clone(), self.target.clone())
    }
}
