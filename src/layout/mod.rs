//! Layout computation and persistence.
//!
//! - `position`: [`Position`], the [`Layout`] map and seeded placement
//! - `force_atlas`: the per-subgraph [`ForceSimulator`]
//! - `scheduler`: [`ChunkScheduler`], partitioned parallel runs
//! - `store`: [`LayoutStore`], JSON export and binary snapshots

pub mod force_atlas;
pub mod position;
pub mod scheduler;
pub mod store;

pub use force_atlas::{AttractionLaw, ConvergenceConfig, ForceAtlasConfig, ForceSimulator, SimulationState};
pub use position::{seed_positions, Layout, Position};
pub use scheduler::{chunk_rng, partition, ChunkScheduler, ScheduleConfig, ScheduleReport};
pub use store::{load_json, load_snapshot, save_snapshot, write_json, LayoutStore};
