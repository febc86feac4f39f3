//! Graph data structures and ingestion.
//!
//! The graph is built once per run by the [`EdgeIngester`] and is read-only
//! afterwards. The force simulator never touches the [`GraphStore`]; it
//! works on frozen [`Subgraph`] views with dense local indices.

mod ingest;
mod node;
mod store;
mod subgraph;

pub use ingest::{parse_line, split_ranges, EdgeIngester, IngestConfig, IngestReport, Strictness};
pub use node::NodeId;
pub use store::GraphStore;
pub use subgraph::Subgraph;
