//! Bounded-concurrency batch copying
//!
//! The [`CopyExecutor`] runs one batch of [`CopyTask`]s at a time. Within a
//! batch, copies run concurrently up to the configured worker limit;
//! `run_batch` returns only when every task in the batch has finished, so a
//! caller never has more than one batch in flight.
//!
//! A failed copy is reported through the event sink and counted in the
//! outcome, but never aborts the batch. The failed file is retried by the
//! next pass because its replica copy still differs (or is still missing).

use std::path::Path;
use std::sync::Arc;

use mirrorsync_core::{Config, CopyReason, IEventSink, SyncEvent};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::planner::CopyTask;

/// Aggregated result of one batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Files copied because the replica lacked them
    pub copied_new: u32,
    /// Files copied because the replica's content differed
    pub copied_modified: u32,
    /// Per-file failures, already reported through the sink
    pub errors: Vec<String>,
}

impl BatchOutcome {
    /// Folds another outcome into this one.
    pub fn merge(&mut self, other: BatchOutcome) {
        self.copied_new += other.copied_new;
        self.copied_modified += other.copied_modified;
        self.errors.extend(other.errors);
    }
}

/// Copies batches of files with bounded concurrency
pub struct CopyExecutor {
    workers: Arc<Semaphore>,
    sink: Arc<dyn IEventSink>,
}

impl CopyExecutor {
    pub fn new(config: &Config, sink: Arc<dyn IEventSink>) -> Self {
        Self {
            workers: Arc::new(Semaphore::new(config.copy.max_workers.max(1))),
            sink,
        }
    }

    /// Runs every task in `batch` to completion, at most `max_workers` at a
    /// time. Individual failures are collected, not propagated.
    pub async fn run_batch(&self, batch: Vec<CopyTask>) -> BatchOutcome {
        let mut joins = JoinSet::new();

        for task in batch {
            let permit = Arc::clone(&self.workers);
            let sink = Arc::clone(&self.sink);
            joins.spawn(async move {
                // The semaphore is never closed, so acquisition cannot fail.
                let Ok(_permit) = permit.acquire_owned().await else {
                    return (task.reason, Err("worker pool closed".to_string()));
                };
                sink.emit(SyncEvent::FileCopied {
                    source: task.source.clone(),
                    dest: task.dest.clone(),
                    reason: task.reason,
                });
                let result = copy_with_metadata(&task.source, &task.dest).await;
                match result {
                    Ok(()) => (task.reason, Ok(())),
                    Err(err) => {
                        let detail = err.to_string();
                        sink.emit(SyncEvent::CopyFailed {
                            source: task.source.clone(),
                            dest: task.dest.clone(),
                            detail: detail.clone(),
                        });
                        (
                            task.reason,
                            Err(format!(
                                "copy {} -> {}: {detail}",
                                task.source.display(),
                                task.dest.display()
                            )),
                        )
                    }
                }
            });
        }

        let mut outcome = BatchOutcome::default();
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok((reason, Ok(()))) => match reason {
                    CopyReason::New => outcome.copied_new += 1,
                    CopyReason::Modified => outcome.copied_modified += 1,
                },
                Ok((_, Err(detail))) => outcome.errors.push(detail),
                Err(err) => outcome.errors.push(format!("copy task panicked: {err}")),
            }
        }
        outcome
    }
}

/// Copies one file and carries the source's modification time over to the
/// destination. Timestamp transfer is best effort: the copy stands even if
/// the mtime cannot be read or written.
async fn copy_with_metadata(source: &Path, dest: &Path) -> std::io::Result<()> {
    tokio::fs::copy(source, dest).await?;

    if let Ok(modified) = tokio::fs::metadata(source).await.and_then(|m| m.modified()) {
        let dest = dest.to_path_buf();
        let _ = tokio::task::spawn_blocking(move || set_modified(&dest, modified)).await;
    }
    Ok(())
}

fn set_modified(path: &Path, modified: std::time::SystemTime) -> std::io::Result<()> {
    let file = std::fs::File::options().write(true).open(path)?;
    file.set_times(std::fs::FileTimes::new().set_modified(modified))
}

// ============================================================================
// Unit tests
// ============================================================================
