//! Error types for the layout engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeId;

/// Why an edge was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeFault {
    /// Both endpoints are the same node.
    SelfLoop(NodeId),
    /// An endpoint is an integer that does not fit a non-negative 64-bit id.
    OutOfRange(String),
}

impl std::fmt::Display for EdgeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeFault::SelfLoop(node) => write!(f, "self-loop on node {}", node),
            EdgeFault::OutOfRange(token) => write!(f, "node id '{}' is out of range", token),
        }
    }
}

/// Engine error type.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Malformed edge line (1-based line number).
    #[error("parse error on line {line}: {reason} (content: {content:?})")]
    Parse {
        line: usize,
        content: String,
        reason: String,
    },

    /// Edge rejected by the graph store.
    #[error("invalid edge{}: {fault}", .line.map(|l| format!(" on line {}", l)).unwrap_or_default())]
    InvalidEdge { line: Option<usize>, fault: EdgeFault },

    /// Input edge list does not exist.
    #[error("input file not found: {}", .path.display())]
    MissingInputFile { path: PathBuf },

    /// Ingestion produced no usable edges.
    #[error("graph has no edges; refusing to lay out an empty node set")]
    EmptyGraph,

    /// A simulation step produced NaN or infinite coordinates.
    #[error("non-finite position for node {node} at iteration {iteration}")]
    NonFinitePosition { node: NodeId, iteration: u32 },

    /// A chunk simulation failed.
    #[error("chunk {index} failed: {source}")]
    Chunk {
        index: usize,
        #[source]
        source: Box<LayoutError>,
    },

    /// The run was cancelled between iterations.
    #[error("cancelled at iteration {iteration}")]
    Cancelled { iteration: u32 },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Snapshot header mismatch.
    #[error("invalid layout snapshot: {0}")]
    Snapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Binary snapshot encoding error
    #[error("snapshot encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl LayoutError {
    /// Create a parse error for a raw input line.
    pub fn parse(line: usize, content: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            content: content.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Wrap an error with the index of the chunk it came from.
    pub fn in_chunk(self, index: usize) -> Self {
        Self::Chunk {
            index,
            source: Box::new(self),
        }
    }

    /// Line number the error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. } => Some(*line),
            Self::InvalidEdge { line, .. } => *line,
            Self::Chunk { source, .. } => source.line(),
            _ => None,
        }
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, LayoutError>;
