//! Positions and the layout map.
//!
//! A [`Layout`] maps every node to one [`Position`]. It is ordered by
//! NodeId so both serialized forms are byte-stable for a given layout.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// A 2D position. Serializes as a two-element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Position {
    /// Create a new position.
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Check that both coordinates are finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another position.
    #[inline]
    pub fn distance(self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<[f64; 2]> for Position {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [f64; 2] {
    fn from(p: Position) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Mapping from NodeId to Position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layout {
    positions: BTreeMap<NodeId, Position>,
}

impl Layout {
    /// Create an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of positioned nodes.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the layout is empty.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Get a node's position.
    pub fn get(&self, id: NodeId) -> Option<Position> {
        self.positions.get(&id).copied()
    }

    /// Check whether a node has a position.
    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Set a node's position, returning the previous one.
    pub fn insert(&mut self, id: NodeId, position: Position) -> Option<Position> {
        self.positions.insert(id, position)
    }

    /// Iterate positions in ascending NodeId order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, Position)> + '_ {
        self.positions.iter().map(|(&id, &p)| (id, p))
    }

    /// Positioned node ids in ascending order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.positions.keys().copied().collect()
    }

    /// Union another layout into this one by NodeId.
    ///
    /// Entries of `other` win on collision. Returns the number of collisions.
    pub fn merge(&mut self, other: Layout) -> usize {
        let mut collisions = 0;
        for (id, p) in other.positions {
            if self.positions.insert(id, p).is_some() {
                collisions += 1;
            }
        }
        collisions
    }

    /// Bounding box as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        if self.positions.is_empty() {
            return None;
        }

        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in self.positions.values() {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        Some((min_x, min_y, max_x, max_y))
    }

    /// Unweighted centroid of the given nodes (all nodes when `None`).
    pub fn centroid(&self, nodes: Option<&[NodeId]>) -> Option<Position> {
        let (mut sx, mut sy, mut n) = (0.0, 0.0, 0usize);
        let mut add = |p: Position| {
            sx += p.x;
            sy += p.y;
            n += 1;
        };
        match nodes {
            Some(ids) => ids.iter().filter_map(|&id| self.get(id)).for_each(&mut add),
            None => self.positions.values().copied().for_each(&mut add),
        }
        (n > 0).then(|| Position::new(sx / n as f64, sy / n as f64))
    }
}

impl FromIterator<(NodeId, Position)> for Layout {
    fn from_iter<I: IntoIterator<Item = (NodeId, Position)>>(iter: I) -> Self {
        Self {
            positions: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Layout {
    type Item = (NodeId, Position);
    type IntoIter = std::collections::btree_map::IntoIter<NodeId, Position>;

    fn into_iter(self) -> Self::IntoIter {
        self.positions.into_iter()
    }
}

/// Draw initial positions uniformly from `[0, extent)^2`.
///
/// One `(x, y)` pair is drawn per node, in slice order, so the result depends
/// only on the generator state and the node count.
pub fn seed_positions<R: Rng + ?Sized>(nodes: &[NodeId], extent: f64, rng: &mut R) -> Vec<Position> {
    nodes
        .iter()
        .map(|_| {
            let x = rng.gen_range(0.0..1.0) * extent;
            let y = rng.gen_range(0.0..1.0) * extent;
            Position::new(x, y)
        })
        .collect()
}
