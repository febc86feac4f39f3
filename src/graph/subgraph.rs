//! Immutable dense-index view of a node-induced subgraph.
//!
//! The simulator works on contiguous `u32` indices rather than NodeIds:
//! index `i` in every per-node buffer refers to `nodes()[i]`. Degrees are
//! computed once at construction and frozen for the lifetime of the view.

use super::node::NodeId;

/// A frozen subgraph with local indices.
#[derive(Debug, Clone)]
pub struct Subgraph {
    /// Local index → stable id.
    nodes: Vec<NodeId>,
    /// Undirected edges as local index pairs, each listed once.
    edges: Vec<(u32, u32)>,
    /// Degree within this subgraph.
    degrees: Vec<u32>,
}

impl Subgraph {
    /// Build a subgraph from local node ids and local index edges.
    ///
    /// Edges referencing indices outside `nodes`, and self-loops, are
    /// discarded.
    pub fn new(nodes: Vec<NodeId>, edges: Vec<(u32, u32)>) -> Self {
        let n = nodes.len() as u32;
        let edges: Vec<(u32, u32)> = edges
            .into_iter()
            .filter(|&(a, b)| a < n && b < n && a != b)
            .collect();

        let mut degrees = vec![0u32; nodes.len()];
        for &(a, b) in &edges {
            degrees[a as usize] += 1;
            degrees[b as usize] += 1;
        }

        Self {
            nodes,
            edges,
            degrees,
        }
    }

    /// Build a standalone subgraph from raw id pairs.
    ///
    /// Nodes are ordered by first appearance. Duplicate edges are not
    /// removed; use [`GraphStore`](super::GraphStore) for deduplication.
    pub fn from_id_pairs(pairs: &[(u64, u64)]) -> Self {
        let mut nodes = Vec::new();
        let mut local = std::collections::HashMap::new();
        let mut index_of = |id: u64, nodes: &mut Vec<NodeId>| -> u32 {
            *local.entry(id).or_insert_with(|| {
                nodes.push(NodeId(id));
                (nodes.len() - 1) as u32
            })
        };

        let mut edges = Vec::with_capacity(pairs.len());
        for &(u, v) in pairs {
            let a = index_of(u, &mut nodes);
            let b = index_of(v, &mut nodes);
            edges.push((a, b));
        }
        Self::new(nodes, edges)
    }

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check if the subgraph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stable ids by local index.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Edges as local index pairs.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Degree of the node at local index `i`.
    pub fn degree(&self, i: usize) -> u32 {
        self.degrees[i]
    }

    /// Per-node degrees by local index.
    pub fn degrees(&self) -> &[u32] {
        &self.degrees
    }
}
