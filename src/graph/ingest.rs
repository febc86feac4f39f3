//! EdgeIngester - parallel edge-list parsing into a [`GraphStore`].
//!
//! The input is one `"<u> <v>"` pair per line. Lines are split into
//! contiguous, balanced chunks (one per worker); each chunk is parsed on the
//! rayon pool into a local edge buffer, then committed to the shared store
//! with a single batched insert. Commit order between workers is
//! unspecified; because insertion is idempotent and commutative the final
//! edge set does not depend on it.
//!
//! Blank lines are ignored. In [`Strictness::Strict`] mode the error with the
//! smallest line number aborts ingestion; in [`Strictness::Lenient`] mode bad
//! lines are logged and skipped.

use std::num::IntErrorKind;
use std::ops::Range;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::node::NodeId;
use super::store::GraphStore;
use crate::error::{EdgeFault, LayoutError, Result};

/// How malformed lines are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Abort on the first bad line.
    #[default]
    Strict,
    /// Skip bad lines and keep going.
    Lenient,
}

/// Configuration for edge ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Number of parse workers / line chunks (default: available CPUs).
    pub workers: Option<usize>,
    /// Malformed line policy (default: strict).
    pub strictness: Strictness,
}

impl IngestConfig {
    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Lines in the input, blank lines included.
    pub lines: usize,
    /// Well-formed edge lines seen (duplicates included).
    pub edges_seen: usize,
    /// Distinct edges added to the store by this run.
    pub edges_added: usize,
    /// Lines skipped in lenient mode.
    pub skipped: usize,
    /// Number of line chunks parsed in parallel.
    pub workers: usize,
}

/// Per-chunk parse statistics.
#[derive(Debug, Default)]
struct ChunkStats {
    edges_seen: usize,
    edges_added: usize,
    skipped: usize,
}

/// Parallel edge-list reader.
#[derive(Debug, Clone, Default)]
pub struct EdgeIngester {
    config: IngestConfig,
}

impl EdgeIngester {
    /// Create an ingester with the given configuration.
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Read and ingest an edge-list file.
    pub fn ingest_file(&self, path: &Path) -> Result<(GraphStore, IngestReport)> {
        let input = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LayoutError::MissingInputFile {
                path: path.to_path_buf(),
            },
            _ => LayoutError::Io(e),
        })?;
        debug!(path = %path.display(), bytes = input.len(), "read edge list");
        self.ingest_str(&input)
    }

    /// Ingest an in-memory edge list into a fresh store.
    ///
    /// Fails with [`LayoutError::EmptyGraph`] if no edge survives.
    pub fn ingest_str(&self, input: &str) -> Result<(GraphStore, IngestReport)> {
        let store = GraphStore::new();
        let report = self.ingest_into(input, &store)?;
        if store.edge_count() == 0 {
            return Err(LayoutError::EmptyGraph);
        }
        Ok((store, report))
    }

    /// Ingest into an existing store.
    ///
    /// On error some workers may already have committed; the store contents
    /// are then not authoritative and should be discarded.
    pub fn ingest_into(&self, input: &str, store: &GraphStore) -> Result<IngestReport> {
        let lines: Vec<&str> = input.lines().collect();
        let ranges = split_ranges(lines.len(), self.config.worker_count());
        let strictness = self.config.strictness;

        let results: Vec<Result<ChunkStats>> = ranges
            .par_iter()
            .map(|range| ingest_chunk(&lines[range.clone()], range.start, strictness, store))
            .collect();

        let mut report = IngestReport {
            lines: lines.len(),
            workers: ranges.len(),
            ..IngestReport::default()
        };
        // Chunks are contiguous and in order, so the first failing chunk
        // holds the lowest failing line.
        for result in results {
            let stats = result?;
            report.edges_seen += stats.edges_seen;
            report.edges_added += stats.edges_added;
            report.skipped += stats.skipped;
        }

        info!(
            lines = report.lines,
            edges_seen = report.edges_seen,
            edges_added = report.edges_added,
            skipped = report.skipped,
            workers = report.workers,
            "edge ingestion complete"
        );
        Ok(report)
    }
}

/// Parse one chunk of lines and commit it.
///
/// `first_line` is the 0-based index of the chunk's first line in the input.
fn ingest_chunk(
    lines: &[&str],
    first_line: usize,
    strictness: Strictness,
    store: &GraphStore,
) -> Result<ChunkStats> {
    let mut stats = ChunkStats::default();
    let mut edges = Vec::with_capacity(lines.len());

    for (offset, raw) in lines.iter().enumerate() {
        let line_no = first_line + offset + 1;
        match parse_line(raw, line_no) {
            Ok(Some(edge)) => edges.push(edge),
            Ok(None) => {}
            Err(err) => match strictness {
                Strictness::Strict => return Err(err),
                Strictness::Lenient => {
                    warn!(line = line_no, error = %err, "skipping edge line");
                    stats.skipped += 1;
                }
            },
        }
    }

    stats.edges_seen = edges.len();
    stats.edges_added = store.add_edges(&edges)?;
    debug!(
        first_line = first_line + 1,
        lines = lines.len(),
        edges = stats.edges_seen,
        added = stats.edges_added,
        "committed chunk"
    );
    Ok(stats)
}

/// Parse a single edge line.
///
/// Returns `Ok(None)` for blank lines. `line_no` is 1-based and only used
/// for error context.
pub fn parse_line(raw: &str, line_no: usize) -> Result<Option<(NodeId, NodeId)>> {
    let mut tokens = raw.split_whitespace();
    let (u, v) = match (tokens.next(), tokens.next(), tokens.next()) {
        (None, _, _) => return Ok(None),
        (Some(u), Some(v), None) => (u, v),
        _ => {
            let found = raw.split_whitespace().count();
            return Err(LayoutError::parse(
                line_no,
                raw,
                format!("expected 2 tokens, found {}", found),
            ));
        }
    };

    let u = parse_node_id(u, raw, line_no)?;
    let v = parse_node_id(v, raw, line_no)?;
    if u == v {
        return Err(LayoutError::InvalidEdge {
            line: Some(line_no),
            fault: EdgeFault::SelfLoop(u),
        });
    }
    Ok(Some((u, v)))
}

fn parse_node_id(token: &str, raw: &str, line_no: usize) -> Result<NodeId> {
    match token.parse::<u64>() {
        Ok(id) => Ok(NodeId(id)),
        Err(e) => {
            let integral = match e.kind() {
                IntErrorKind::PosOverflow => true,
                IntErrorKind::InvalidDigit => token
                    .strip_prefix('-')
                    .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())),
                _ => false,
            };
            if integral {
                Err(LayoutError::InvalidEdge {
                    line: Some(line_no),
                    fault: EdgeFault::OutOfRange(token.to_string()),
                })
            } else {
                Err(LayoutError::parse(
                    line_no,
                    raw,
                    format!("'{}' is not a non-negative integer", token),
                ))
            }
        }
    }
}

/// Split `len` items into at most `parts` contiguous ranges whose sizes
/// differ by at most one. Always returns at least one range.
pub fn split_ranges(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let extra = len % parts;

    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}
