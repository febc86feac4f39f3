//! LayoutStore - persistence of computed layouts.
//!
//! Two artifacts are produced:
//! - a JSON object `{"<id>": [x, y], ...}` with keys in ascending id order,
//!   for consumers such as the visualization front end;
//! - a bincode snapshot wrapped in a versioned envelope, used as a
//!   checkpoint to skip recomputation.
//!
//! Both are written to a temporary file in the target directory and then
//! renamed over the destination.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::position::Layout;
use crate::error::{LayoutError, Result};

/// Leading bytes of every snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"EGLY";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotOut<'a> {
    magic: [u8; 4],
    version: u32,
    layout: &'a Layout,
}

#[derive(Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    version: u32,
}

#[derive(Deserialize)]
struct SnapshotIn {
    #[allow(dead_code)]
    magic: [u8; 4],
    #[allow(dead_code)]
    version: u32,
    layout: Layout,
}

/// Paths of the two layout artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutStore {
    json_path: PathBuf,
    snapshot_path: PathBuf,
}

impl LayoutStore {
    /// Create a store writing to the given paths.
    pub fn new(json_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            json_path: json_path.into(),
            snapshot_path: snapshot_path.into(),
        }
    }

    /// JSON export path.
    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Snapshot path.
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Whether a snapshot exists on disk.
    pub fn has_snapshot(&self) -> bool {
        self.snapshot_path.is_file()
    }

    /// Write both the JSON export and the snapshot.
    pub fn persist(&self, layout: &Layout) -> Result<()> {
        write_json(layout, &self.json_path)?;
        save_snapshot(layout, &self.snapshot_path)?;
        info!(
            nodes = layout.len(),
            json = %self.json_path.display(),
            snapshot = %self.snapshot_path.display(),
            "layout written"
        );
        Ok(())
    }

    /// Load the snapshot.
    pub fn load(&self) -> Result<Layout> {
        load_snapshot(&self.snapshot_path)
    }
}

/// Write the JSON export of `layout` to `path`.
pub fn write_json(layout: &Layout, path: &Path) -> Result<()> {
    write_atomic(path, |writer| Ok(serde_json::to_writer(writer, layout)?))?;
    debug!(path = %path.display(), nodes = layout.len(), "JSON layout written");
    Ok(())
}

/// Read a JSON export.
pub fn load_json(path: &Path) -> Result<Layout> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Encode `layout` as a snapshot.
pub fn encode_snapshot(layout: &Layout) -> Result<Vec<u8>> {
    Ok(bincode::serialize(&SnapshotOut {
        magic: SNAPSHOT_MAGIC,
        version: SNAPSHOT_VERSION,
        layout,
    })?)
}

/// Decode a snapshot, checking its magic and version.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Layout> {
    let header: SnapshotHeader = bincode::deserialize(bytes)
        .map_err(|e| LayoutError::Snapshot(format!("unreadable header: {}", e)))?;
    if header.magic != SNAPSHOT_MAGIC {
        return Err(LayoutError::Snapshot(format!(
            "bad magic {:?}, expected {:?}",
            header.magic, SNAPSHOT_MAGIC
        )));
    }
    if header.version != SNAPSHOT_VERSION {
        return Err(LayoutError::Snapshot(format!(
            "unsupported version {}, expected {}",
            header.version, SNAPSHOT_VERSION
        )));
    }
    let snapshot: SnapshotIn = bincode::deserialize(bytes)?;
    Ok(snapshot.layout)
}

/// Write a snapshot of `layout` to `path`.
pub fn save_snapshot(layout: &Layout, path: &Path) -> Result<()> {
    let bytes = encode_snapshot(layout)?;
    write_atomic(path, |writer| Ok(writer.write_all(&bytes)?))?;
    debug!(path = %path.display(), bytes = bytes.len(), "snapshot written");
    Ok(())
}

/// Read a snapshot from `path`.
pub fn load_snapshot(path: &Path) -> Result<Layout> {
    let bytes = std::fs::read(path)?;
    let layout = decode_snapshot(&bytes)?;
    debug!(path = %path.display(), nodes = layout.len(), "snapshot loaded");
    Ok(layout)
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| LayoutError::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeId;
    use crate::layout::position::Position;

    fn sample() -> Layout {
        [
            (NodeId(2), Position::new(-3.0, 2.5)),
            (NodeId(1), Position::new(0.5, 1.0)),
            (NodeId(40), Position::new(0.125, -7.25)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_json_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph_layout.json");
        write_json(&sample(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, r#"{"1":[0.5,1.0],"2":[-3.0,2.5],"40":[0.125,-7.25]}"#);
        assert_eq!(load_json(&path).unwrap(), sample());
    }

    #[test]
    fn test_json_preserves_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph_layout.json");
        let layout: Layout = (0..2000u64)
            .map(|i| {
                let x = (i as f64 + 0.1) * 1.000000123456789 / 7.3;
                let y = -(i as f64).sqrt() * std::f64::consts::PI / 3.0 + 1e-7;
                (NodeId(i), Position::new(x, y))
            })
            .collect();

        write_json(&layout, &path).unwrap();
        let back = load_json(&path).unwrap();
        assert_eq!(back.len(), layout.len());
        for ((id, a), (_, b)) in layout.iter().zip(back.iter()) {
            assert_eq!(a.x.to_bits(), b.x.to_bits(), "node {} x", id);
            assert_eq!(a.y.to_bits(), b.y.to_bits(), "node {} y", id);
        }
    }

    #[test]
    fn test_snapshot_preserves_bits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full_pos.bin");
        let layout: Layout = [(NodeId(7), Position::new(0.1 + 0.2, f64::MIN_POSITIVE))]
            .into_iter()
            .collect();

        save_snapshot(&layout, &path).unwrap();
        let back = load_snapshot(&path).unwrap();
        let p = back.get(NodeId(7)).unwrap();
        assert_eq!(p.x.to_bits(), (0.1 + 0.2f64).to_bits());
        assert_eq!(p.y.to_bits(), f64::MIN_POSITIVE.to_bits());
    }

    #[test]
    fn test_snapshot_rejects_bad_magic() {
        let mut bytes = encode_snapshot(&sample()).unwrap();
        bytes[0] ^= 0xFF;
        assert!(matches!(decode_snapshot(&bytes), Err(LayoutError::Snapshot(_))));
    }

    #[test]
    fn test_snapshot_rejects_other_version() {
        let mut bytes = encode_snapshot(&sample()).unwrap();
        // Version follows the four magic bytes as a little-endian u32.
        bytes[4] = bytes[4].wrapping_add(1);
        assert!(matches!(decode_snapshot(&bytes), Err(LayoutError::Snapshot(_))));
    }

    #[test]
    fn test_snapshot_rejects_truncated_input() {
        assert!(matches!(decode_snapshot(&[1, 2]), Err(LayoutError::Snapshot(_))));

        let bytes = encode_snapshot(&sample()).unwrap();
        assert!(decode_snapshot(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        write_json(&Layout::new(), &path).unwrap();
        write_json(&sample(), &path).unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(load_json(&path).unwrap(), sample());
    }

    #[test]
    fn test_store_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::new(dir.path().join("a.json"), dir.path().join("a.bin"));
        assert!(!store.has_snapshot());

        store.persist(&sample()).unwrap();
        assert!(store.has_snapshot());
        assert_eq!(store.load().unwrap(), sample());
        assert_eq!(load_json(store.json_path()).unwrap(), sample());
    }

    #[test]
    fn test_load_missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_snapshot(&dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, LayoutError::Io(_)));
    }
}
