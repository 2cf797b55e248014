//! End-to-end synchronization pass tests
//!
//! Each test builds a source and replica tree on disk, runs one or more
//! passes, and asserts on the resulting replica state plus the summary and
//! emitted events.

use std::path::Path;
use std::sync::Arc;

use mirrorsync_core::{Config, ConfigBuilder, IEventSink, MemorySink, SyncEvent};
use mirrorsync_engine::SyncEngine;
use tempfile::TempDir;

struct Harness {
    _root: TempDir,
    source: std::path::PathBuf,
    replica: std::path::PathBuf,
    sink: Arc<MemorySink>,
    engine: SyncEngine,
}

fn harness_with_config(config: Config) -> Harness {
    let root = TempDir::new().unwrap();
    let source = root.path().join("source");
    let replica = root.path().join("replica");
    std::fs::create_dir(&source).unwrap();
    let sink = Arc::new(MemorySink::new());
    let engine = SyncEngine::new(
        &source,
        &replica,
        &config,
        Arc::clone(&sink) as Arc<dyn IEventSink>,
    );
    Harness {
        _root: root,
        source,
        replica,
        sink,
        engine,
    }
}

fn harness() -> Harness {
    harness_with_config(Config::default())
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// Collects every path under `root`, relative to it, sorted.
fn tree_of(root: &Path) -> Vec<String> {
    fn visit(dir: &Path, root: &Path, out: &mut Vec<String>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            let rel = path.strip_prefix(root).unwrap();
            out.push(rel.to_string_lossy().into_owned());
            if path.is_dir() {
                visit(&path, root, out);
            }
        }
    }
    let mut out = Vec::new();
    visit(root, root, &mut out);
    out.sort();
    out
}

// ============================================================================
// Basic mirroring
// ============================================================================

#[tokio::test]
async fn first_pass_mirrors_a_populated_source() {
    let h = harness();
    write(&h.source.join("top.txt"), "top");
    write(&h.source.join("docs/readme.md"), "# readme");
    write(&h.source.join("docs/deep/notes.txt"), "notes");
    std::fs::create_dir(h.source.join("empty")).unwrap();

    let summary = h.engine.run_pass().await.unwrap();

    assert_eq!(tree_of(&h.replica), tree_of(&h.source));
    assert_eq!(read(&h.replica.join("docs/deep/notes.txt")), "notes");
    assert_eq!(summary.files_copied_new, 3);
    assert_eq!(summary.dirs_created, 3);
    assert!(summary.is_clean());
}

#[tokio::test]
async fn modified_source_file_is_recopied() {
    let h = harness();
    write(&h.source.join("a.txt"), "version 1");
    h.engine.run_pass().await.unwrap();

    write(&h.source.join("a.txt"), "version 2");
    let summary = h.engine.run_pass().await.unwrap();

    assert_eq!(read(&h.replica.join("a.txt")), "version 2");
    assert_eq!(summary.files_copied_modified, 1);
    assert_eq!(summary.files_copied_new, 0);
}

#[tokio::test]
async fn unmodified_files_are_skipped_not_recopied() {
    let h = harness();
    write(&h.source.join("a.txt"), "stable");
    write(&h.source.join("b.txt"), "also stable");
    h.engine.run_pass().await.unwrap();
    h.sink.clear();

    let summary = h.engine.run_pass().await.unwrap();

    assert_eq!(summary.files_copied(), 0);
    assert_eq!(summary.files_skipped, 2);
    assert_eq!(
        h.sink
            .count_matching(|e| matches!(e, SyncEvent::FileCopied { .. })),
        0
    );
}

#[tokio::test]
async fn deleted_source_entries_are_deleted_from_the_replica() {
    let h = harness();
    write(&h.source.join("keep.txt"), "k");
    write(&h.source.join("gone/one.txt"), "1");
    write(&h.source.join("gone/sub/two.txt"), "2");
    h.engine.run_pass().await.unwrap();

    std::fs::remove_dir_all(h.source.join("gone")).unwrap();
    let summary = h.engine.run_pass().await.unwrap();

    assert_eq!(tree_of(&h.replica), vec!["keep.txt".to_string()]);
    assert_eq!(summary.files_deleted, 2);
    assert_eq!(summary.dirs_deleted, 2);
}

// ============================================================================
// Idempotence and convergence
// ============================================================================

#[tokio::test]
async fn second_pass_over_a_synced_tree_does_nothing() {
    let h = harness();
    write(&h.source.join("a.txt"), "a");
    write(&h.source.join("d/b.txt"), "b");
    h.engine.run_pass().await.unwrap();

    let summary = h.engine.run_pass().await.unwrap();

    assert_eq!(summary.files_copied(), 0);
    assert_eq!(summary.dirs_created, 0);
    assert_eq!(summary.files_deleted, 0);
    assert_eq!(summary.dirs_deleted, 0);
    assert_eq!(summary.files_skipped, 2);
    assert!(summary.is_clean());
}

#[tokio::test]
async fn mixed_churn_converges_in_one_pass() {
    let h = harness();
    write(&h.source.join("stays.txt"), "same");
    write(&h.source.join("changes.txt"), "old");
    write(&h.source.join("leaves.txt"), "bye");
    h.engine.run_pass().await.unwrap();

    write(&h.source.join("changes.txt"), "new");
    write(&h.source.join("arrives.txt"), "hi");
    std::fs::remove_file(h.source.join("leaves.txt")).unwrap();

    let summary = h.engine.run_pass().await.unwrap();

    assert_eq!(tree_of(&h.replica), tree_of(&h.source));
    assert_eq!(read(&h.replica.join("changes.txt")), "new");
    assert_eq!(summary.files_copied_new, 1);
    assert_eq!(summary.files_copied_modified, 1);
    assert_eq!(summary.files_deleted, 1);
    assert_eq!(summary.files_skipped, 1);
}

#[tokio::test]
async fn replica_only_tree_is_emptied() {
    let h = harness();
    // Pre-populate the replica with content the source never had.
    write(&h.replica.join("stray.txt"), "x");
    write(&h.replica.join("strays/deep/more.txt"), "y");

    let summary = h.engine.run_pass().await.unwrap();

    assert!(tree_of(&h.replica).is_empty());
    assert_eq!(summary.files_deleted, 2);
    assert_eq!(summary.dirs_deleted, 2);
}

// ============================================================================
// Batching
// ============================================================================

#[tokio::test]
async fn small_batch_size_still_copies_everything() {
    let config = ConfigBuilder::new()
        .copy_batch_size(2)
        .copy_max_workers(2)
        .build();
    let h = harness_with_config(config);
    for i in 0..7 {
        write(&h.source.join(format!("f{i}.txt")), &format!("body {i}"));
    }

    let summary = h.engine.run_pass().await.unwrap();

    assert_eq!(summary.files_copied_new, 7);
    assert_eq!(tree_of(&h.replica).len(), 7);
    for i in 0..7 {
        assert_eq!(read(&h.replica.join(format!("f{i}.txt"))), format!("body {i}"));
    }
}

#[tokio::test]
async fn batch_size_one_serializes_but_completes() {
    let config = ConfigBuilder::new()
        .copy_batch_size(1)
        .copy_max_workers(1)
        .build();
    let h = harness_with_config(config);
    write(&h.source.join("a.txt"), "a");
    write(&h.source.join("b.txt"), "b");
    write(&h.source.join("sub/c.txt"), "c");

    let summary = h.engine.run_pass().await.unwrap();
    assert_eq!(summary.files_copied_new, 3);
    assert_eq!(tree_of(&h.replica), tree_of(&h.source));
}

// ============================================================================
// Type clashes
// ============================================================================

#[tokio::test]
async fn replica_file_where_source_has_directory_is_replaced() {
    let h = harness();
    write(&h.source.join("entry/inside.txt"), "content");
    h.engine.run_pass().await.unwrap();

    // Flip the replica entry to a file behind the engine's back.
    std::fs::remove_dir_all(h.replica.join("entry")).unwrap();
    write(&h.replica.join("entry"), "i am a file");

    let summary = h.engine.run_pass().await.unwrap();

    assert!(h.replica.join("entry").is_dir());
    assert_eq!(read(&h.replica.join("entry/inside.txt")), "content");
    assert!(summary.is_clean());
    assert_eq!(
        h.sink
            .count_matching(|e| matches!(e, SyncEvent::TypeClash { .. })),
        1
    );
}

#[tokio::test]
async fn replica_directory_where_source_has_file_converges_in_two_passes() {
    let h = harness();
    write(&h.source.join("entry"), "file content");
    write(&h.replica.join("entry/stale.txt"), "stale");

    // First pass: the obstructing directory is emptied and removed.
    let first = h.engine.run_pass().await.unwrap();
    assert!(!h.replica.join("entry").exists());
    assert!(!first.errors.is_empty());
    assert_eq!(first.files_deleted, 1);
    assert_eq!(first.dirs_deleted, 1);

    // Second pass: the file copies into the now-clear spot.
    let second = h.engine.run_pass().await.unwrap();
    assert_eq!(read(&h.replica.join("entry")), "file content");
    assert_eq!(second.files_copied_new, 1);
    assert!(second.is_clean());
}

// ============================================================================
// Fingerprinting behavior
// ============================================================================

#[tokio::test]
async fn same_content_different_mtime_is_not_recopied() {
    let h = harness();
    write(&h.source.join("a.txt"), "identical");
    h.engine.run_pass().await.unwrap();

    // Rewrite the source with the same bytes; the mtime changes but the
    // content fingerprint does not.
    write(&h.source.join("a.txt"), "identical");
    h.sink.clear();

    let summary = h.engine.run_pass().await.unwrap();
    assert_eq!(summary.files_copied(), 0);
    assert_eq!(summary.files_skipped, 1);
}

#[tokio::test]
async fn large_file_survives_chunked_hashing_and_copy() {
    let config = ConfigBuilder::new().hashing_chunk_size_bytes(1024).build();
    let h = harness_with_config(config);
    let body: String = (0..50_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    write(&h.source.join("big.txt"), &body);

    h.engine.run_pass().await.unwrap();
    assert_eq!(read(&h.replica.join("big.txt")), body);

    // And the next pass recognizes it as unchanged.
    let summary = h.engine.run_pass().await.unwrap();
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.files_copied(), 0);
}

// ============================================================================
// Event stream
// ============================================================================

#[tokio::test]
async fn events_cover_every_action_of_a_pass() {
    let h = harness();
    write(&h.source.join("new.txt"), "n");
    write(&h.source.join("dir/inner.txt"), "i");
    write(&h.replica.join("old.txt"), "o");

    h.engine.run_pass().await.unwrap();

    assert_eq!(
        h.sink
            .count_matching(|e| matches!(e, SyncEvent::FileCopied { .. })),
        2
    );
    assert_eq!(
        h.sink
            .count_matching(|e| matches!(e, SyncEvent::DirectoryCreated { .. })),
        1
    );
    assert_eq!(
        h.sink
            .count_matching(|e| matches!(e, SyncEvent::FileDeleted { .. })),
        1
    );
}
