//! egograph-layout - compute a force-directed layout for an edge list.
//!
//! Writes the positions as JSON for the front end and as a binary snapshot.
//! With `--reuse-snapshot` an existing snapshot is loaded instead of
//! recomputing, and only the JSON export is refreshed.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::info;

use egograph_layout::graph::Strictness;
use egograph_layout::{run_pipeline, CancelToken, EngineConfig, LayoutStore};

/// Chunked parallel ForceAtlas2 layout for large edge lists.
#[derive(Parser, Debug)]
#[command(name = "egograph-layout")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Edge list: one "u v" pair of non-negative integer ids per line
    #[arg(short, long)]
    input: PathBuf,

    /// JSON export path
    #[arg(long, default_value = "graph_layout.json")]
    json: PathBuf,

    /// Binary snapshot path
    #[arg(long, default_value = "full_pos.bin")]
    snapshot: PathBuf,

    /// YAML engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Iterations per chunk
    #[arg(long)]
    iterations: Option<u32>,

    /// Barnes–Hut opening threshold (0 = exact)
    #[arg(long)]
    theta: Option<f64>,

    /// Nodes per chunk
    #[arg(long, conflicts_with = "single_chunk")]
    chunk_size: Option<usize>,

    /// Lay out the whole graph as one chunk
    #[arg(long)]
    single_chunk: bool,

    /// Worker threads for ingestion and layout
    #[arg(short, long)]
    workers: Option<usize>,

    /// Seed for initial positions
    #[arg(long)]
    seed: Option<u64>,

    /// Skip malformed lines instead of failing
    #[arg(long)]
    lenient: bool,

    /// Load the snapshot if it exists instead of recomputing
    #[arg(long)]
    reuse_snapshot: bool,
}

impl Cli {
    /// Build the engine configuration: file (or defaults), then flags.
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_yaml_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(iterations) = self.iterations {
            config.simulation.iterations = iterations;
        }
        if let Some(theta) = self.theta {
            config.simulation.theta = theta;
        }
        if self.single_chunk {
            config.schedule.chunk_size = None;
        } else if let Some(chunk_size) = self.chunk_size {
            config.schedule.chunk_size = Some(chunk_size);
        }
        if let Some(workers) = self.workers {
            config.ingest.workers = Some(workers);
            config.schedule.workers = Some(workers);
        }
        if let Some(seed) = self.seed {
            config.schedule.seed = seed;
        }
        if self.lenient {
            config.ingest.strictness = Strictness::Lenient;
        }

        config.validate()?;
        Ok(config)
    }
}

fn layout(cli: &Cli, config: &EngineConfig, store: &LayoutStore) -> anyhow::Result<()> {
    if cli.reuse_snapshot && store.has_snapshot() {
        let layout = store
            .load()
            .with_context(|| format!("loading snapshot {}", store.snapshot_path().display()))?;
        info!(nodes = layout.len(), "reusing existing snapshot");
        egograph_layout::layout::write_json(&layout, store.json_path())?;
        return Ok(());
    }

    let output = run_pipeline(&cli.input, config, &CancelToken::new())
        .with_context(|| format!("laying out {}", cli.input.display()))?;
    store.persist(&output.layout)?;
    print_summary(&output, store.json_path());
    Ok(())
}

fn print_summary(output: &egograph_layout::PipelineOutput, json: &Path) {
    println!(
        "Laid out {} nodes in {} chunks ({} inter-chunk edges ignored) -> {}",
        output.layout.len(),
        output.schedule.chunks,
        output.schedule.crossing_edges,
        json.display()
    );
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.engine_config()?;
    let store = LayoutStore::new(&cli.json, &cli.snapshot);
    layout(&cli, &config, &store)
}
