//! GraphStore - thread-safe undirected simple graph.
//!
//! The store keeps the topology in a petgraph `UnGraph` behind a single
//! `parking_lot::RwLock`. Ingestion workers share one store by reference and
//! commit their parsed batches through [`GraphStore::add_edges`], which takes
//! the write lock once per batch. After ingestion the store is only read.
//!
//! Invariants:
//! - no self-loops (rejected with [`EdgeFault::SelfLoop`])
//! - no parallel edges (insertion is idempotent)
//! - every edge endpoint is a node; adding an edge adds both endpoints

use std::collections::HashMap;

use parking_lot::RwLock;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use super::node::NodeId;
use super::subgraph::Subgraph;
use crate::error::{EdgeFault, LayoutError, Result};

/// Topology guarded by the store lock.
#[derive(Debug)]
struct GraphInner {
    /// The underlying graph. Nodes store their stable NodeId.
    graph: UnGraph<NodeId, ()>,

    /// Map from stable NodeId to petgraph NodeIndex
    node_id_to_index: HashMap<NodeId, NodeIndex>,
}

impl GraphInner {
    fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            graph: UnGraph::with_capacity(node_capacity, edge_capacity),
            node_id_to_index: HashMap::with_capacity(node_capacity),
        }
    }

    fn ensure_node(&mut self, id: NodeId) -> NodeIndex {
        if let Some(&index) = self.node_id_to_index.get(&id) {
            return index;
        }
        let index = self.graph.add_node(id);
        self.node_id_to_index.insert(id, index);
        index
    }

    /// Insert an already validated edge. Returns true if it was new.
    fn insert_edge(&mut self, u: NodeId, v: NodeId) -> bool {
        let a = self.ensure_node(u);
        let b = self.ensure_node(v);
        if self.graph.find_edge(a, b).is_some() {
            return false;
        }
        self.graph.add_edge(a, b, ());
        true
    }
}

/// Shared, synchronized graph store.
#[derive(Debug)]
pub struct GraphStore {
    inner: RwLock<GraphInner>,
}

impl GraphStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create a store with pre-allocated capacity.
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(GraphInner::with_capacity(node_capacity, edge_capacity)),
        }
    }

    /// Build a store from an edge iterator, failing on the first self-loop.
    pub fn from_edges<I>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        let store = Self::new();
        for (u, v) in edges {
            store.add_edge(NodeId(u), NodeId(v))?;
        }
        Ok(store)
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Add an undirected edge.
    ///
    /// Returns `Ok(true)` if the edge is new, `Ok(false)` if it was already
    /// present. Safe to call from many threads at once.
    pub fn add_edge(&self, u: NodeId, v: NodeId) -> Result<bool> {
        check_edge(u, v)?;
        Ok(self.inner.write().insert_edge(u, v))
    }

    /// Add a batch of edges under a single write lock.
    ///
    /// The batch is validated before the lock is taken, so a rejected batch
    /// leaves the store untouched. Returns the number of new edges.
    pub fn add_edges(&self, edges: &[(NodeId, NodeId)]) -> Result<usize> {
        for &(u, v) in edges {
            check_edge(u, v)?;
        }

        let mut inner = self.inner.write();
        let mut added = 0;
        for &(u, v) in edges {
            if inner.insert_edge(u, v) {
                added += 1;
            }
        }
        Ok(added)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get the number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.read().graph.node_count()
    }

    /// Get the number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.read().graph.edge_count()
    }

    /// Check whether a node is known to the store.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.inner.read().node_id_to_index.contains_key(&id)
    }

    /// All node ids in ascending order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let inner = self.inner.read();
        let mut nodes: Vec<NodeId> = inner.node_id_to_index.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Number of edges touching a node (0 for unknown nodes).
    pub fn degree(&self, id: NodeId) -> usize {
        let inner = self.inner.read();
        inner
            .node_id_to_index
            .get(&id)
            .map(|&index| inner.graph.edges(index).count())
            .unwrap_or(0)
    }

    /// Neighbors of a node in ascending order.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let inner = self.inner.read();
        let mut neighbors: Vec<NodeId> = inner
            .node_id_to_index
            .get(&id)
            .map(|&index| {
                inner
                    .graph
                    .neighbors(index)
                    .filter_map(|n| inner.graph.node_weight(n).copied())
                    .collect()
            })
            .unwrap_or_default();
        neighbors.sort_unstable();
        neighbors
    }

    /// All edges as `(min, max)` pairs in ascending order.
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        let inner = self.inner.read();
        let mut edges: Vec<(NodeId, NodeId)> = inner
            .graph
            .edge_references()
            .map(|e| {
                let a = inner.graph[e.source()];
                let b = inner.graph[e.target()];
                if a <= b { (a, b) } else { (b, a) }
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Extract the subgraph induced by `nodes`.
    ///
    /// Keeps exactly the edges whose endpoints are both in `nodes`; edges
    /// leaving the set are dropped. Nodes unknown to the store are kept as
    /// isolated vertices. Duplicate ids in `nodes` are ignored.
    pub fn induced_subgraph(&self, nodes: &[NodeId]) -> Subgraph {
        let inner = self.inner.read();

        let mut members: Vec<NodeId> = Vec::with_capacity(nodes.len());
        let mut local: HashMap<NodeId, u32> = HashMap::with_capacity(nodes.len());
        for &id in nodes {
            if !local.contains_key(&id) {
                local.insert(id, members.len() as u32);
                members.push(id);
            }
        }

        let mut edges = Vec::new();
        for (i, id) in members.iter().enumerate() {
            let Some(&index) = inner.node_id_to_index.get(id) else {
                continue;
            };
            for neighbor in inner.graph.neighbors(index) {
                let neighbor_id = inner.graph[neighbor];
                if let Some(&j) = local.get(&neighbor_id) {
                    // Each undirected edge is seen from both ends; keep one.
                    if (i as u32) < j {
                        edges.push((i as u32, j));
                    }
                }
            }
        }
        // Neighbor order follows insertion order; sort so the simulation does
        // not depend on how ingestion interleaved.
        edges.sort_unstable();

        Subgraph::new(members, edges)
    }

    /// Count edges whose endpoints fall in different groups of `assignment`.
    ///
    /// `assignment` maps a node to its group; edges touching unassigned nodes
    /// are not counted.
    pub fn crossing_edges(&self, assignment: &HashMap<NodeId, usize>) -> usize {
        let inner = self.inner.read();
        inner
            .graph
            .edge_references()
            .filter(|e| {
                let a = assignment.get(&inner.graph[e.source()]);
                let b = assignment.get(&inner.graph[e.target()]);
                matches!((a, b), (Some(x), Some(y)) if x != y)
            })
            .count()
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn check_edge(u: NodeId, v: NodeId) -> Result<()> {
    if u == v {
        return Err(LayoutError::InvalidEdge {
            line: None,
            fault: EdgeFault::SelfLoop(u),
        });
    }
    Ok(())
}
