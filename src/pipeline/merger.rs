//! Cross-chunk graph merging.
//!
//! Per-chunk graphs arrive with run-scoped unique ids but overlapping
//! content: every chunk names a root, sibling concepts recur across
//! chunks, and structural links get restated. The merger collapses all of
//! that into one graph:
//!
//! - all roots collapse onto one canonical root (matched by normalized
//!   label first, then unconditionally — exactly one root survives)
//! - non-root nodes deduplicate on (parent, normalized label)
//! - edges are rewritten through the id remap and deduplicate on their
//!   (source, target) pair
//!
//! Output order preserves first-seen order across chunks, so the merge is
//! deterministic for a fixed input order.

use crate::graph::{ConceptGraph, Edge, Node, NodeId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Merge per-chunk graphs, in chunk order, into a single graph.
pub fn merge_chunk_graphs(chunk_graphs: Vec<ConceptGraph>) -> ConceptGraph {
    let mut state = MergeState::default();
    for graph in chunk_graphs {
        state.fold(graph);
    }
    debug!(
        nodes = state.nodes.len(),
        edges = state.edges.len(),
        "merge complete"
    );
    ConceptGraph {
        nodes: state.nodes,
        edges: state.edges,
    }
}

#[derive(Default)]
struct MergeState {
    /// normalized root label → canonical root id
    root_by_label: HashMap<String, NodeId>,
    /// (parent id, normalized label) → canonical child id
    child_by_parent_label: HashMap<(String, String), NodeId>,
    /// local id → canonical id for every dropped duplicate
    id_remap: HashMap<NodeId, NodeId>,
    /// the one root that survives
    canonical_root: Option<NodeId>,
    /// kept (source, target) pairs
    edge_seen: HashSet<(NodeId, NodeId)>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl MergeState {
    fn fold(&mut self, graph: ConceptGraph) {
        for node in &graph.nodes {
            if node.kind.is_root() {
                self.fold_root(node);
            } else {
                self.fold_child(node, &graph);
            }
        }

        for edge in graph.edges {
            self.fold_edge(edge);
        }
    }

    fn fold_root(&mut self, node: &Node) {
        let label = node.normalized_label();

        if let Some(existing) = self.root_by_label.get(&label) {
            self.id_remap.insert(node.id.clone(), existing.clone());
            return;
        }

        match &self.canonical_root {
            Some(canonical) => {
                // A differently-labeled root from a later chunk still folds
                // onto the canonical one; its label is registered so its
                // children key against the right parent.
                self.root_by_label.insert(label, canonical.clone());
                self.id_remap.insert(node.id.clone(), canonical.clone());
            }
            None => {
                self.canonical_root = Some(node.id.clone());
                self.root_by_label.insert(label, node.id.clone());
                self.nodes.push(node.clone());
            }
        }
    }

    fn fold_child(&mut self, node: &Node, graph: &ConceptGraph) {
        // Parent = source of the first edge targeting this node within its
        // own chunk. At most one incoming structural edge per node is part
        // of the extraction contract; an orphan keeps its own id as the
        // parent slot so it stays unparented under its local key.
        let parent_slot = graph
            .edges
            .iter()
            .find(|e| e.target == node.id)
            .map(|e| self.canonical_id(&e.source))
            .unwrap_or_else(|| node.id.clone());

        let key = (parent_slot.as_str().to_string(), node.normalized_label());

        if let Some(existing) = self.child_by_parent_label.get(&key) {
            self.id_remap.insert(node.id.clone(), existing.clone());
        } else {
            self.child_by_parent_label.insert(key, node.id.clone());
            self.nodes.push(node.clone());
        }
    }

    fn fold_edge(&mut self, edge: Edge) {
        let source = self.canonical_id(&edge.source);
        let target = self.canonical_id(&edge.target);

        if self.edge_seen.insert((source.clone(), target.clone())) {
            let mut kept = edge;
            kept.source = source;
            kept.target = target;
            self.edges.push(kept);
        }
    }

    fn canonical_id(&self, id: &NodeId) -> NodeId {
        self.id_remap.get(id).cloned().unwrap_or_else(|| id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeId, NodeKind};

    fn node(chunk: usize, ordinal: usize, kind: NodeKind, label: &str) -> Node {
        Node::new(
            NodeId::scoped(chunk, ordinal),
            kind,
            label,
            format!("about {}", label),
        )
    }

    fn edge(chunk: usize, ordinal: usize, source: &NodeId, target: &NodeId) -> Edge {
        Edge::new(EdgeId::scoped(chunk, ordinal), source.clone(), target.clone())
    }

    /// Root "Photosynthesis" with one child, ids scoped by `chunk`.
    fn photosynthesis_chunk(chunk: usize, root_label: &str, child_label: &str) -> ConceptGraph {
        let root = node(chunk, 0, NodeKind::Root, root_label);
        let child = node(chunk, 1, NodeKind::Sub, child_label);
        let link = edge(chunk, 0, &root.id, &child.id);
        ConceptGraph {
            nodes: vec![root, child],
            edges: vec![link],
        }
    }

    // --- Scenario: duplicate roots collapse by label, case-insensitively ---

    #[test]
    fn duplicate_roots_merge_to_one() {
        let merged = merge_chunk_graphs(vec![
            photosynthesis_chunk(0, "Photosynthesis", "Light"),
            photosynthesis_chunk(1, "photosynthesis", "Dark"),
        ]);

        assert_eq!(merged.root_count(), 1);
        let root_id = NodeId::scoped(0, 0);
        assert!(merged.get_node(&root_id).is_some());

        // Both children hang off the surviving root.
        assert!(merged.has_edge(&root_id, &NodeId::scoped(0, 1)));
        assert!(merged.has_edge(&root_id, &NodeId::scoped(1, 1)));
    }

    #[test]
    fn differently_labeled_roots_still_collapse() {
        let merged = merge_chunk_graphs(vec![
            photosynthesis_chunk(0, "Photosynthesis", "Light"),
            photosynthesis_chunk(1, "Plant Biology", "Roots"),
        ]);

        assert_eq!(merged.root_count(), 1, "exactly one root survives merging");
        assert!(merged.has_edge(&NodeId::scoped(0, 0), &NodeId::scoped(1, 1)));
    }

    // --- Scenario: same-label siblings under one parent deduplicate ---

    #[test]
    fn duplicate_siblings_merge() {
        let merged = merge_chunk_graphs(vec![
            photosynthesis_chunk(0, "Photosynthesis", "Chlorophyll"),
            photosynthesis_chunk(1, "Photosynthesis", "chlorophyll "),
        ]);

        assert_eq!(merged.nodes.len(), 2, "root plus one merged child");
        assert_eq!(merged.edges.len(), 1, "duplicate structural link collapses");
    }

    #[test]
    fn same_label_under_different_parents_stays_distinct() {
        // chunk 0: root -> Energy; chunk 1: root -> Storage -> Energy
        let chunk0 = photosynthesis_chunk(0, "Photosynthesis", "Energy");

        let root = node(1, 0, NodeKind::Root, "Photosynthesis");
        let storage = node(1, 1, NodeKind::Sub, "Storage");
        let energy = node(1, 2, NodeKind::Detail, "Energy");
        let chunk1 = ConceptGraph {
            edges: vec![
                edge(1, 0, &root.id, &storage.id),
                edge(1, 1, &storage.id, &energy.id),
            ],
            nodes: vec![root, storage, energy],
        };

        let merged = merge_chunk_graphs(vec![chunk0, chunk1]);
        let energy_nodes: Vec<_> = merged
            .nodes
            .iter()
            .filter(|n| n.normalized_label() == "energy")
            .collect();
        assert_eq!(energy_nodes.len(), 2);
    }

    // --- Scenario: merging a graph with itself is idempotent ---

    #[test]
    fn merge_is_idempotent() {
        let once = merge_chunk_graphs(vec![photosynthesis_chunk(0, "Topic", "Idea")]);
        let twice = merge_chunk_graphs(vec![
            photosynthesis_chunk(0, "Topic", "Idea"),
            photosynthesis_chunk(0, "Topic", "Idea"),
        ]);

        assert_eq!(once.nodes.len(), twice.nodes.len());
        assert_eq!(once.edges.len(), twice.edges.len());
    }

    // --- Scenario: orphans survive unparented ---

    #[test]
    fn orphan_nodes_are_kept() {
        let root = node(0, 0, NodeKind::Root, "Topic");
        let orphan = node(0, 1, NodeKind::Detail, "Stray");
        let graph = ConceptGraph {
            nodes: vec![root, orphan],
            edges: vec![],
        };

        let merged = merge_chunk_graphs(vec![graph]);
        assert_eq!(merged.nodes.len(), 2);
        assert!(merged.get_node(&NodeId::scoped(0, 1)).is_some());
    }

    #[test]
    fn same_label_orphans_from_different_chunks_stay_distinct() {
        let make = |chunk: usize| ConceptGraph {
            nodes: vec![
                node(chunk, 0, NodeKind::Root, "Topic"),
                node(chunk, 1, NodeKind::Detail, "Stray"),
            ],
            edges: vec![],
        };

        let merged = merge_chunk_graphs(vec![make(0), make(1)]);
        // Orphans key on their own (unique) local id, so they never
        // collapse across chunks.
        let strays = merged
            .nodes
            .iter()
            .filter(|n| n.normalized_label() == "stray")
            .count();
        assert_eq!(strays, 2);
    }

    // --- Scenario: output order is first-seen order ---

    #[test]
    fn first_seen_order_is_preserved() {
        let merged = merge_chunk_graphs(vec![
            photosynthesis_chunk(0, "Topic", "First"),
            photosynthesis_chunk(1, "Topic", "Second"),
        ]);

        let labels: Vec<&str> = merged.nodes.iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, vec!["Topic", "First", "Second"]);
    }

    #[test]
    fn empty_input_merges_to_empty_graph() {
        assert!(merge_chunk_graphs(vec![]).is_empty());
        assert!(merge_chunk_graphs(vec![ConceptGraph::empty()]).is_empty());
    }
}
