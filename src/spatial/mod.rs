//! Spatial partitioning for approximate N-body forces.
//!
//! This module provides the Barnes–Hut quad-tree used by the force
//! simulator to evaluate repulsion in O(log n) per node.

mod quadtree;

pub use quadtree::{pairwise_repulsion, ForceSample, QuadTree, RepulsionLaw};
