//! End-to-end tests: edge-list file in, JSON export and snapshot out.

use std::fs;
use std::path::Path;

use egograph_layout::graph::Strictness;
use egograph_layout::layout::{load_json, load_snapshot};
use egograph_layout::{run_pipeline, CancelToken, EngineConfig, LayoutError, LayoutStore, NodeId};

fn small_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.simulation.iterations = 60;
    config.schedule.chunk_size = Some(8);
    config.schedule.workers = Some(2);
    config.ingest.workers = Some(3);
    config
}

fn write_edges(dir: &Path, text: &str) -> std::path::PathBuf {
    let path = dir.join("edges.txt");
    fs::write(&path, text).unwrap();
    path
}

/// Three ego networks around hubs 100, 200 and 300, plus a bridge.
fn ego_edges() -> String {
    let mut text = String::new();
    for hub in [100u64, 200, 300] {
        for leaf in 1..=6 {
            text.push_str(&format!("{} {}\n", hub, hub + leaf));
        }
        text.push_str(&format!("{} {}\n", hub + 1, hub + 2));
    }
    text.push_str("106 201\n");
    text
}

#[test]
fn test_pipeline_writes_both_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_edges(dir.path(), &ego_edges());
    let config = small_config();

    let output = run_pipeline(&input, &config, &CancelToken::new()).unwrap();
    assert_eq!(output.layout.len(), 21);
    assert_eq!(output.ingest.edges_added, 22);
    assert_eq!(output.schedule.chunks, 3);

    let store = LayoutStore::new(dir.path().join("graph_layout.json"), dir.path().join("full_pos.bin"));
    store.persist(&output.layout).unwrap();

    let from_json = load_json(store.json_path()).unwrap();
    let from_snapshot = load_snapshot(store.snapshot_path()).unwrap();
    assert_eq!(from_json, output.layout);
    assert_eq!(from_snapshot, output.layout);
    assert!(from_json.iter().all(|(_, p)| p.is_finite()));

    let text = fs::read_to_string(store.json_path()).unwrap();
    assert!(text.starts_with("{\"100\":["));
}

#[test]
fn test_pipeline_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_edges(dir.path(), &ego_edges());

    let mut single_worker = small_config();
    single_worker.ingest.workers = Some(1);
    single_worker.schedule.workers = Some(1);

    let a = run_pipeline(&input, &small_config(), &CancelToken::new()).unwrap();
    let b = run_pipeline(&input, &single_worker, &CancelToken::new()).unwrap();
    assert_eq!(a.layout, b.layout);
}

#[test]
fn test_line_order_does_not_change_layout() {
    let dir = tempfile::tempdir().unwrap();
    let forward = ego_edges();
    let mut lines: Vec<&str> = forward.lines().collect();
    lines.reverse();
    let reversed = lines.join("\n");

    let a_path = write_edges(dir.path(), &forward);
    let a = run_pipeline(&a_path, &small_config(), &CancelToken::new()).unwrap();
    let b_path = write_edges(dir.path(), &reversed);
    let b = run_pipeline(&b_path, &small_config(), &CancelToken::new()).unwrap();

    assert_eq!(a.layout, b.layout);
}

#[test]
fn test_strict_pipeline_reports_bad_line() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_edges(dir.path(), "1 2\n2 3\n3 x\n4 5\n");

    let err = run_pipeline(&input, &small_config(), &CancelToken::new()).unwrap_err();
    assert!(matches!(err, LayoutError::Parse { line: 3, .. }), "{}", err);
}

#[test]
fn test_lenient_pipeline_skips_bad_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_edges(dir.path(), "1 2\n2 3\n3 x\n4 4\n4 5\n");
    let mut config = small_config();
    config.ingest.strictness = Strictness::Lenient;

    let output = run_pipeline(&input, &config, &CancelToken::new()).unwrap();
    assert_eq!(output.ingest.skipped, 2);
    assert_eq!(output.layout.nodes(), vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4), NodeId(5)]);
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_pipeline(&dir.path().join("nope.txt"), &small_config(), &CancelToken::new()).unwrap_err();
    assert!(matches!(err, LayoutError::MissingInputFile { .. }));
}

#[test]
fn test_blank_input_is_empty_graph() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_edges(dir.path(), "\n\n   \n");
    let err = run_pipeline(&input, &small_config(), &CancelToken::new()).unwrap_err();
    assert!(matches!(err, LayoutError::EmptyGraph));
}

#[test]
fn test_cancelled_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_edges(dir.path(), &ego_edges());
    let token = CancelToken::new();
    token.cancel();

    let err = run_pipeline(&input, &small_config(), &token).unwrap_err();
    assert!(matches!(err, LayoutError::Cancelled { .. }));
}
