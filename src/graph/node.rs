//! Node representation in the concept graph

use serde::{Deserialize, Serialize};

/// Unique identifier for a node.
///
/// Canonical ids are deterministic and scoped per pipeline run
/// (`c{chunk}-n{ordinal}`), so two chunks can never collide even when the
/// generation service reuses trivial ids like `node1` in every reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the canonical id for the `ordinal`-th node of chunk `chunk`.
    pub fn scoped(chunk: usize, ordinal: usize) -> Self {
        Self(format!("c{}-n{}", chunk, ordinal))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hierarchy level of a node within the mindmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The central concept. Exactly one survives merging per request.
    Root,
    /// Direct child of the root.
    Sub,
    /// Lower-level supporting detail.
    Detail,
}

impl NodeKind {
    /// Parse a kind string from the generation service.
    ///
    /// The service is not trusted to follow the contract; anything
    /// unrecognized degrades to `Detail` instead of failing the chunk.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "root" => Self::Root,
            "sub" => Self::Sub,
            _ => Self::Detail,
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

/// A node in the concept graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier (globally unique after merge)
    pub id: NodeId,
    /// Hierarchy level
    pub kind: NodeKind,
    /// Heading of the node
    pub label: String,
    /// One-line description of the node
    pub content: String,
}

impl Node {
    /// Create a new node.
    pub fn new(
        id: NodeId,
        kind: NodeKind,
        label: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            content: content.into(),
        }
    }

    /// Label normalized for merge-time deduplication (trim + lowercase).
    pub fn normalized_label(&self) -> String {
        self.label.trim().to_lowercase()
    }
}
