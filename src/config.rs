//! Engine configuration.
//!
//! All sections default to the reference tuning, so an empty YAML document
//! is a valid configuration:
//!
//! ```yaml
//! ingest:
//!   workers: 10
//!   strictness: lenient
//! simulation:
//!   iterations: 2000
//!   theta: 1.2
//!   repulsion: linear
//!   convergence:
//!     epsilon: 0.001
//!     window: 20
//! schedule:
//!   chunk_size: 10000
//!   seed: 42
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::graph::IngestConfig;
use crate::layout::{ForceAtlasConfig, ScheduleConfig};

/// Configuration of a full pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Edge list parsing.
    pub ingest: IngestConfig,
    /// Per-chunk force simulation.
    pub simulation: ForceAtlasConfig,
    /// Partitioning and parallelism.
    pub schedule: ScheduleConfig,
}

impl EngineConfig {
    /// Parse a YAML document and validate it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file and validate it.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            LayoutError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.workers == Some(0) {
            return Err(LayoutError::config("ingest.workers must be positive"));
        }
        self.simulation.validate()?;
        self.schedule.validate()?;
        Ok(())
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
