//! ChunkScheduler - partitioned parallel layout.
//!
//! The node set is sorted by NodeId and cut into contiguous chunks. Each
//! chunk's induced subgraph is simulated by its own [`ForceSimulator`] on a
//! rayon pool, and the per-chunk layouts are merged by NodeId.
//!
//! Chunks do not share a coordinate frame. Edges between chunks exert no
//! force; their number is reported so callers can judge the loss. Setting
//! `chunk_size` to `None` lays out the whole graph as one chunk.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::force_atlas::{ForceAtlasConfig, ForceSimulator, SimulationState};
use super::position::{seed_positions, Layout};
use crate::cancel::CancelToken;
use crate::error::{LayoutError, Result};
use crate::graph::{GraphStore, NodeId};

/// Partitioning and parallelism settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Nodes per chunk; `None` runs a single chunk (default: 10000).
    pub chunk_size: Option<usize>,
    /// Worker threads (default: available CPUs).
    pub workers: Option<usize>,
    /// Seed for initial positions (default: 42).
    pub seed: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            chunk_size: Some(10_000),
            workers: None,
            seed: 42,
        }
    }
}

impl ScheduleConfig {
    /// Reject a zero chunk size or worker count.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == Some(0) {
            return Err(LayoutError::config("schedule.chunk_size must be positive"));
        }
        if self.workers == Some(0) {
            return Err(LayoutError::config("schedule.workers must be positive"));
        }
        Ok(())
    }

    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Summary of one scheduled layout run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Number of chunks simulated.
    pub chunks: usize,
    /// Number of nodes positioned.
    pub nodes: usize,
    /// Edges whose endpoints landed in different chunks.
    pub crossing_edges: usize,
    /// Nodes that started from a prior layout instead of a seeded position.
    pub reused_positions: usize,
    /// Chunks that stopped on the convergence criterion.
    pub converged_chunks: usize,
    /// Worker threads used.
    pub workers: usize,
}

/// Per-chunk generator: the run seed with the chunk index as stream.
pub fn chunk_rng(seed: u64, chunk: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(chunk as u64);
    rng
}

/// Cut sorted nodes into contiguous chunks.
pub fn partition(nodes: &[NodeId], chunk_size: Option<usize>) -> Vec<&[NodeId]> {
    match chunk_size {
        _ if nodes.is_empty() => Vec::new(),
        Some(size) => nodes.chunks(size.max(1)).collect(),
        None => vec![nodes],
    }
}

/// Outcome of one chunk simulation.
struct ChunkOutcome {
    layout: Layout,
    state: SimulationState,
    reused: usize,
}

/// Runs independent simulations over chunks of the graph.
pub struct ChunkScheduler {
    schedule: ScheduleConfig,
    simulation: ForceAtlasConfig,
}

impl ChunkScheduler {
    /// Create a scheduler.
    pub fn new(schedule: ScheduleConfig, simulation: ForceAtlasConfig) -> Self {
        Self {
            schedule,
            simulation,
        }
    }

    /// Partitioning settings.
    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    /// Per-chunk simulation settings.
    pub fn simulation(&self) -> &ForceAtlasConfig {
        &self.simulation
    }

    /// Lay out every node of `store` from seeded positions.
    pub fn run(&self, store: &GraphStore, cancel: &CancelToken) -> Result<(Layout, ScheduleReport)> {
        self.run_with_prior(store, None, cancel)
    }

    /// Lay out every node of `store`, starting nodes found in `prior` from
    /// their prior position.
    ///
    /// Fails with the error of the lowest-index failing chunk, wrapped in
    /// [`LayoutError::Chunk`]. Cancellation is reported unwrapped.
    pub fn run_with_prior(
        &self,
        store: &GraphStore,
        prior: Option<&Layout>,
        cancel: &CancelToken,
    ) -> Result<(Layout, ScheduleReport)> {
        self.schedule.validate()?;
        self.simulation.validate()?;

        let nodes = store.nodes();
        if nodes.is_empty() {
            return Err(LayoutError::EmptyGraph);
        }

        let chunks = partition(&nodes, self.schedule.chunk_size);
        let crossing_edges = if chunks.len() > 1 {
            let assignment: HashMap<NodeId, usize> = chunks
                .iter()
                .enumerate()
                .flat_map(|(index, members)| members.iter().map(move |&id| (id, index)))
                .collect();
            store.crossing_edges(&assignment)
        } else {
            0
        };

        let workers = self.schedule.worker_count();
        info!(
            nodes = nodes.len(),
            chunks = chunks.len(),
            chunk_size = ?self.schedule.chunk_size,
            workers,
            "chunk plan"
        );
        if crossing_edges > 0 {
            warn!(
                crossing_edges,
                total_edges = store.edge_count(),
                "edges between chunks exert no force in this layout"
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| LayoutError::config(format!("failed to start layout workers: {}", e)))?;

        let results: Vec<Result<ChunkOutcome>> = pool.install(|| {
            chunks
                .par_iter()
                .enumerate()
                .map(|(index, members)| {
                    self.run_chunk(store, index, members, prior, cancel)
                        .map_err(|e| match e {
                            cancelled @ LayoutError::Cancelled { .. } => cancelled,
                            other => other.in_chunk(index),
                        })
                })
                .collect()
        });

        let mut layout = Layout::new();
        let mut report = ScheduleReport {
            chunks: chunks.len(),
            crossing_edges,
            workers,
            ..ScheduleReport::default()
        };
        for result in results {
            let outcome = result?;
            report.reused_positions += outcome.reused;
            if outcome.state == SimulationState::Converged {
                report.converged_chunks += 1;
            }
            layout.merge(outcome.layout);
        }
        report.nodes = layout.len();

        info!(
            nodes = report.nodes,
            converged_chunks = report.converged_chunks,
            reused_positions = report.reused_positions,
            "layout merged"
        );
        Ok((layout, report))
    }

    fn run_chunk(
        &self,
        store: &GraphStore,
        index: usize,
        members: &[NodeId],
        prior: Option<&Layout>,
        cancel: &CancelToken,
    ) -> Result<ChunkOutcome> {
        let subgraph = store.induced_subgraph(members);

        // Seeds are drawn for every member so a node's seed does not depend
        // on which of its chunk peers have prior positions.
        let mut initial = seed_positions(
            subgraph.nodes(),
            self.simulation.initial_extent,
            &mut chunk_rng(self.schedule.seed, index),
        );
        let mut reused = 0;
        if let Some(prior) = prior {
            for (slot, &id) in initial.iter_mut().zip(subgraph.nodes()) {
                if let Some(p) = prior.get(id).filter(|p| p.is_finite()) {
                    *slot = p;
                    reused += 1;
                }
            }
        }

        debug!(
            chunk = index,
            nodes = subgraph.node_count(),
            edges = subgraph.edge_count(),
            reused,
            "simulating chunk"
        );

        let mut simulator = ForceSimulator::new(subgraph, self.simulation.clone(), initial)?;
        let state = simulator.run(cancel)?;
        Ok(ChunkOutcome {
            layout: simulator.into_layout(),
            state,
            reused,
        })
    }
}
