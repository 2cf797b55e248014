//! Single-pass synchronization orchestration
//!
//! A [`SyncEngine`] runs one pass at a time through a fixed sequence of
//! phases:
//!
//! 1. verify the source root exists and is a directory (fatal otherwise);
//! 2. ensure the replica root directory exists;
//! 3. walk the source top-down, creating directories and copying new or
//!    modified files in batches of `copy.batch_size`, at most
//!    `copy.max_workers` copies in flight;
//! 4. walk the replica bottom-up, deleting files and then directories that
//!    have no same-type counterpart under the source.
//!
//! Only a missing or unusable source root fails the pass. Every per-item
//! failure is reported through the event sink, recorded in the
//! [`PassSummary`], and retried naturally on the next pass because the
//! engine keeps no state between passes.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mirrorsync_core::{Config, EngineError, IEventSink, SyncEvent};
use tokio::fs;

use crate::executor::CopyExecutor;
use crate::planner::{CopyTask, DeleteOp, DiffPlanner};
use crate::walker::{TreeWalker, WalkOrder};

// ============================================================================
// PassSummary
// ============================================================================

/// What one synchronization pass did
#[derive(Debug, Default)]
pub struct PassSummary {
    /// Directories created in the replica
    pub dirs_created: u32,
    /// Files copied because the replica lacked them
    pub files_copied_new: u32,
    /// Files copied because the replica's content differed
    pub files_copied_modified: u32,
    /// Files left alone because their fingerprints matched
    pub files_skipped: u32,
    /// Files deleted from the replica
    pub files_deleted: u32,
    /// Directories deleted from the replica
    pub dirs_deleted: u32,
    /// Per-item failures, already reported through the sink
    pub errors: Vec<String>,
    /// Wall-clock duration of the pass
    pub duration: Duration,
}

impl PassSummary {
    /// True when every item the pass touched succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total files written to the replica this pass.
    pub fn files_copied(&self) -> u32 {
        self.files_copied_new + self.files_copied_modified
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// One-way mirror synchronization engine
pub struct SyncEngine {
    source_root: PathBuf,
    replica_root: PathBuf,
    batch_size: usize,
    planner: DiffPlanner,
    executor: CopyExecutor,
    sink: Arc<dyn IEventSink>,
}

impl SyncEngine {
    pub fn new(
        source_root: impl Into<PathBuf>,
        replica_root: impl Into<PathBuf>,
        config: &Config,
        sink: Arc<dyn IEventSink>,
    ) -> Self {
        let source_root = source_root.into();
        let replica_root = replica_root.into();
        Self {
            planner: DiffPlanner::new(&source_root, &replica_root, config, Arc::clone(&sink)),
            executor: CopyExecutor::new(config, Arc::clone(&sink)),
            batch_size: config.copy.batch_size.max(1),
            source_root,
            replica_root,
            sink,
        }
    }

    /// Runs one full synchronization pass.
    ///
    /// # Errors
    /// Fails when the source root is missing or not a directory, when the
    /// replica root cannot be created, or when one of the two tree walks
    /// cannot even start. All other failures are per-item: reported through
    /// the sink and collected in the summary.
    pub async fn run_pass(&self) -> Result<PassSummary, EngineError> {
        let started = Instant::now();
        let mut summary = PassSummary::default();

        self.check_source_root().await?;
        fs::create_dir_all(&self.replica_root).await?;

        self.create_and_copy(&mut summary).await?;
        self.delete_obsolete(&mut summary).await?;

        summary.duration = started.elapsed();
        Ok(summary)
    }

    async fn check_source_root(&self) -> Result<(), EngineError> {
        match fs::metadata(&self.source_root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(EngineError::SourceNotADirectory(self.source_root.clone())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(EngineError::SourceMissing(self.source_root.clone()))
            }
            Err(err) => Err(EngineError::Io(err)),
        }
    }

    // ========================================================================
    // Create/copy phase
    // ========================================================================

    /// Walks the source top-down, accumulating copy tasks and flushing them
    /// in batches of exactly `batch_size`. The remainder flushes after the
    /// walk completes.
    async fn create_and_copy(&self, summary: &mut PassSummary) -> Result<(), EngineError> {
        let mut walker = TreeWalker::open(&self.source_root, WalkOrder::TopDown)
            .await
            .map_err(|source| EngineError::Walk {
                dir: self.source_root.clone(),
                source,
            })?;

        let mut pending: Vec<CopyTask> = Vec::new();
        loop {
            let level = match walker.next_level().await {
                Ok(Some(level)) => level,
                Ok(None) => break,
                Err(err) => {
                    summary
                        .errors
                        .push(format!("source walk aborted: {err}"));
                    break;
                }
            };

            let plan = self.planner.plan_level(&level).await;
            summary.dirs_created += plan.dirs_created;
            summary.files_skipped += plan.files_skipped;
            summary.errors.extend(plan.errors);
            pending.extend(plan.tasks);

            while let Some(batch) = take_full_batch(&mut pending, self.batch_size) {
                self.flush_batch(batch, summary).await;
            }
        }

        if !pending.is_empty() {
            self.flush_batch(pending, summary).await;
        }
        Ok(())
    }

    async fn flush_batch(&self, batch: Vec<CopyTask>, summary: &mut PassSummary) {
        let outcome = self.executor.run_batch(batch).await;
        summary.files_copied_new += outcome.copied_new;
        summary.files_copied_modified += outcome.copied_modified;
        summary.errors.extend(outcome.errors);
    }

    // ========================================================================
    // Delete phase
    // ========================================================================

    /// Walks the replica bottom-up removing obsolete entries. Files go
    /// first within each level; directories are removed non-recursively,
    /// which the bottom-up order makes possible because each directory's
    /// contents were handled by a deeper level.
    async fn delete_obsolete(&self, summary: &mut PassSummary) -> Result<(), EngineError> {
        let mut walker = TreeWalker::open(&self.replica_root, WalkOrder::BottomUp)
            .await
            .map_err(|source| EngineError::Walk {
                dir: self.replica_root.clone(),
                source,
            })?;

        loop {
            let level = match walker.next_level().await {
                Ok(Some(level)) => level,
                Ok(None) => break,
                Err(err) => {
                    summary
                        .errors
                        .push(format!("replica walk aborted: {err}"));
                    break;
                }
            };

            for op in self.planner.plan_deletions(&level).await {
                match op {
                    DeleteOp::File(path) => match fs::remove_file(&path).await {
                        Ok(()) => {
                            self.sink.emit(SyncEvent::FileDeleted { path });
                            summary.files_deleted += 1;
                        }
                        Err(err) => {
                            self.sink.emit(SyncEvent::DeleteFailed {
                                path: path.clone(),
                                detail: err.to_string(),
                            });
                            summary
                                .errors
                                .push(format!("could not delete {}: {err}", path.display()));
                        }
                    },
                    DeleteOp::Directory(path) => match fs::remove_dir(&path).await {
                        Ok(()) => {
                            self.sink.emit(SyncEvent::DirectoryDeleted { path });
                            summary.dirs_deleted += 1;
                        }
                        Err(err) => {
                            // Not empty yet (a deeper deletion failed) or
                            // otherwise stuck; the next pass retries.
                            self.sink.emit(SyncEvent::DeleteFailed {
                                path: path.clone(),
                                detail: err.to_string(),
                            });
                            summary
                                .errors
                                .push(format!("could not delete {}: {err}", path.display()));
                        }
                    },
                }
            }
        }
        Ok(())
    }
}

/// Splits off the next batch of exactly `batch_size` tasks, or `None` while
/// fewer are pending. A flush therefore never exceeds `batch_size`; the
/// sub-threshold remainder flushes after the walk completes.
fn take_full_batch(pending: &mut Vec<CopyTask>, batch_size: usize) -> Option<Vec<CopyTask>> {
    if pending.len() < batch_size {
        return None;
    }
    Some(pending.drain(..batch_size).collect())
}

// ============================================================================
// Unit tests
// ============================================================================
