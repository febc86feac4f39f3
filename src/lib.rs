//! EgoGraph Layout - chunked parallel force-directed layout engine.
//!
//! Reads an undirected edge list, lays the graph out with a ForceAtlas2-style
//! simulation and writes the positions as JSON plus a binary snapshot.
//!
//! # Architecture
//!
//! - `graph`: thread-safe [`GraphStore`] built by the parallel [`EdgeIngester`]
//! - `spatial`: Barnes–Hut [`QuadTree`] for approximate repulsion
//! - `layout`: [`ForceSimulator`], [`ChunkScheduler`] and [`LayoutStore`]
//! - `config`: YAML-loadable [`EngineConfig`]
//! - `cancel`: cooperative [`CancelToken`]
//!
//! # Example
//!
//! ```no_run
//! use egograph_layout::{run_pipeline, CancelToken, EngineConfig, LayoutStore};
//!
//! let config = EngineConfig::from_yaml_file("layout.yaml")?;
//! let output = run_pipeline("edges.txt".as_ref(), &config, &CancelToken::new())?;
//! LayoutStore::new("graph_layout.json", "full_pos.bin").persist(&output.layout)?;
//! # Ok::<(), egograph_layout::LayoutError>(())
//! ```

use std::path::Path;

use tracing::info;

pub mod cancel;
pub mod config;
pub mod error;
pub mod graph;
pub mod layout;
pub mod spatial;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use error::{EdgeFault, LayoutError, Result};
pub use graph::{EdgeIngester, GraphStore, IngestReport, NodeId};
pub use layout::{ChunkScheduler, ForceSimulator, Layout, LayoutStore, Position, ScheduleReport};
pub use spatial::QuadTree;

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Merged layout of every node.
    pub layout: Layout,
    /// Ingestion summary.
    pub ingest: IngestReport,
    /// Scheduling summary.
    pub schedule: ScheduleReport,
}

/// Ingest `input` and lay out the resulting graph.
///
/// Nothing is written to disk; pass the layout to a [`LayoutStore`].
pub fn run_pipeline(input: &Path, config: &EngineConfig, cancel: &CancelToken) -> Result<PipelineOutput> {
    config.validate()?;

    let ingester = EdgeIngester::new(config.ingest.clone());
    let (store, ingest) = ingester.ingest_file(input)?;
    info!(
        nodes = store.node_count(),
        edges = store.edge_count(),
        skipped = ingest.skipped,
        workers = ingest.workers,
        "ingestion finished"
    );

    let scheduler = ChunkScheduler::new(config.schedule.clone(), config.simulation.clone());
    let (layout, schedule) = scheduler.run(&store, cancel)?;

    Ok(PipelineOutput {
        layout,
        ingest,
        schedule,
    })
}
