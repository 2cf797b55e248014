//! Diff planning: classify one directory level into actions
//!
//! The [`DiffPlanner`] compares a source level against the mirrored replica
//! location (or a replica level against the mirrored source location, for
//! the deletion pass) and decides what has to happen:
//!
//! - missing replica directories are created immediately (directory
//!   creation is cheap and must precede the files inside it);
//! - files are classified as new, modified, or unmodified - modification is
//!   decided purely by content fingerprints, never by timestamps;
//! - during the bottom-up pass, replica entries without a same-type source
//!   counterpart become deletions.
//!
//! Type clashes (a file where the other tree has a directory) are resolved
//! without recursive deletion: an obstructing replica *file* is removed
//! right away so the directory can be created, while an obstructing replica
//! *directory* is left for the bottom-up pass, which empties and removes it
//! because none of its contents have same-type source counterparts. The
//! mirrored file then copies on the following pass.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mirrorsync_core::{Config, CopyReason, IEventSink, SyncEvent};
use tokio::fs;

use crate::fingerprint::fingerprint_file;
use crate::walker::DirLevel;

// ============================================================================
// CopyTask
// ============================================================================

/// A single planned file copy, consumed by the executor within the same pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    /// File to read under the source tree
    pub source: PathBuf,
    /// Mirrored destination under the replica tree
    pub dest: PathBuf,
    /// Why the copy is needed
    pub reason: CopyReason,
}

/// Result of planning one source directory level
#[derive(Debug, Default)]
pub struct LevelPlan {
    /// File copies to accumulate into the pending batch
    pub tasks: Vec<CopyTask>,
    /// Directories created in the replica while planning
    pub dirs_created: u32,
    /// Files whose fingerprints matched (no action)
    pub files_skipped: u32,
    /// Per-item failures encountered while planning
    pub errors: Vec<String>,
}

/// A single planned deletion from the replica
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOp {
    /// Remove one file
    File(PathBuf),
    /// Remove one directory, which bottom-up ordering has already emptied
    Directory(PathBuf),
}

// ============================================================================
// DiffPlanner
// ============================================================================

/// Classifies directory levels into create/copy/delete actions
pub struct DiffPlanner {
    source_root: PathBuf,
    replica_root: PathBuf,
    chunk_size: usize,
    sink: Arc<dyn IEventSink>,
}

impl DiffPlanner {
    pub fn new(
        source_root: impl Into<PathBuf>,
        replica_root: impl Into<PathBuf>,
        config: &Config,
        sink: Arc<dyn IEventSink>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            replica_root: replica_root.into(),
            chunk_size: config.hashing.chunk_size_bytes,
            sink,
        }
    }

    /// Maps a path under the source tree to its mirrored replica path.
    fn replica_path_for(&self, source_path: &Path) -> PathBuf {
        source_path
            .strip_prefix(&self.source_root)
            .map(|rel| self.replica_root.join(rel))
            .unwrap_or_else(|_| self.replica_root.clone())
    }

    /// Maps a path under the replica tree to its mirrored source path.
    fn source_path_for(&self, replica_path: &Path) -> PathBuf {
        replica_path
            .strip_prefix(&self.replica_root)
            .map(|rel| self.source_root.join(rel))
            .unwrap_or_else(|_| self.source_root.clone())
    }

    // ========================================================================
    // Create/copy classification (top-down pass)
    // ========================================================================

    /// Plans one source level: creates missing replica directories
    /// immediately and returns the file copies the level needs.
    pub async fn plan_level(&self, level: &DirLevel) -> LevelPlan {
        let mut plan = LevelPlan::default();
        let dest_dir = self.replica_path_for(&level.dir);

        for name in &level.subdirs {
            self.ensure_directory(&dest_dir.join(name), &mut plan).await;
        }

        for name in &level.files {
            let source = level.dir.join(name);
            let dest = dest_dir.join(name);
            self.classify_file(source, dest, &mut plan).await;
        }

        plan
    }

    /// Check-then-create for one replica directory. Tolerates the benign
    /// race where the directory appears between check and create
    /// (`create_dir_all` succeeds on an existing directory).
    async fn ensure_directory(&self, dest: &Path, plan: &mut LevelPlan) {
        match fs::metadata(dest).await {
            Ok(meta) if meta.is_dir() => return,
            Ok(_) => {
                // A replica file obstructs the mirrored directory.
                self.sink.emit(SyncEvent::TypeClash {
                    path: dest.to_path_buf(),
                });
                if let Err(err) = fs::remove_file(dest).await {
                    self.sink.emit(SyncEvent::DeleteFailed {
                        path: dest.to_path_buf(),
                        detail: err.to_string(),
                    });
                    plan.errors.push(format!(
                        "could not remove file obstructing directory {}: {err}",
                        dest.display()
                    ));
                    return;
                }
                self.sink.emit(SyncEvent::StaleFileRemoved {
                    path: dest.to_path_buf(),
                });
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                self.sink.emit(SyncEvent::DirectoryCreateFailed {
                    path: dest.to_path_buf(),
                    detail: err.to_string(),
                });
                plan.errors
                    .push(format!("could not stat {}: {err}", dest.display()));
                return;
            }
        }

        match fs::create_dir_all(dest).await {
            Ok(()) => {
                self.sink.emit(SyncEvent::DirectoryCreated {
                    path: dest.to_path_buf(),
                });
                plan.dirs_created += 1;
            }
            Err(err) => {
                self.sink.emit(SyncEvent::DirectoryCreateFailed {
                    path: dest.to_path_buf(),
                    detail: err.to_string(),
                });
                plan.errors
                    .push(format!("could not create {}: {err}", dest.display()));
            }
        }
    }

    async fn classify_file(&self, source: PathBuf, dest: PathBuf, plan: &mut LevelPlan) {
        match fs::metadata(&dest).await {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                plan.tasks.push(CopyTask {
                    source,
                    dest,
                    reason: CopyReason::New,
                });
            }
            Err(err) => {
                // Cannot confirm the replica's state; re-copy rather than
                // risk silent staleness. Whatever content may be there is
                // stale by assumption, so try to clear it first, same as
                // the confirmed-modified path.
                self.sink.emit(SyncEvent::FingerprintFailed {
                    path: dest.clone(),
                    detail: err.to_string(),
                });
                match fs::remove_file(&dest).await {
                    Ok(()) => self.sink.emit(SyncEvent::StaleFileRemoved { path: dest.clone() }),
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => self.sink.emit(SyncEvent::DeleteFailed {
                        path: dest.clone(),
                        detail: err.to_string(),
                    }),
                }
                plan.tasks.push(CopyTask {
                    source,
                    dest,
                    reason: CopyReason::Modified,
                });
            }
            Ok(meta) if meta.is_dir() => {
                // A replica directory obstructs the mirrored file. The
                // bottom-up pass empties and removes it; the file copies on
                // the following pass.
                self.sink.emit(SyncEvent::TypeClash { path: dest.clone() });
                plan.errors.push(format!(
                    "replica has a directory where the source has a file: {}",
                    dest.display()
                ));
            }
            Ok(_) => {
                if self.files_differ(&source, &dest).await {
                    // Remove the stale content now so it cannot outlive a
                    // failed copy.
                    match fs::remove_file(&dest).await {
                        Ok(()) => self.sink.emit(SyncEvent::StaleFileRemoved {
                            path: dest.clone(),
                        }),
                        Err(err) => self.sink.emit(SyncEvent::DeleteFailed {
                            path: dest.clone(),
                            detail: err.to_string(),
                        }),
                    }
                    plan.tasks.push(CopyTask {
                        source,
                        dest,
                        reason: CopyReason::Modified,
                    });
                } else {
                    self.sink.emit(SyncEvent::FileSkipped { path: dest });
                    plan.files_skipped += 1;
                }
            }
        }
    }

    /// Content comparison by fingerprint. A fingerprint failure on either
    /// side counts as "differs": skipping a file we cannot verify would risk
    /// silent staleness, and re-copying is idempotent.
    async fn files_differ(&self, source: &Path, dest: &Path) -> bool {
        let source_fp = match fingerprint_file(source, self.chunk_size).await {
            Ok(fp) => fp,
            Err(err) => {
                self.sink.emit(SyncEvent::FingerprintFailed {
                    path: source.to_path_buf(),
                    detail: err.to_string(),
                });
                return true;
            }
        };
        let dest_fp = match fingerprint_file(dest, self.chunk_size).await {
            Ok(fp) => fp,
            Err(err) => {
                self.sink.emit(SyncEvent::FingerprintFailed {
                    path: dest.to_path_buf(),
                    detail: err.to_string(),
                });
                return true;
            }
        };
        source_fp != dest_fp
    }

    // ========================================================================
    // Deletion classification (bottom-up pass)
    // ========================================================================

    /// Plans deletions for one replica level: every file or directory with
    /// no same-type counterpart under the source is removed. Files are
    /// listed before directories; the directories of this level were
    /// already emptied by earlier (deeper) levels of the same walk.
    pub async fn plan_deletions(&self, level: &DirLevel) -> Vec<DeleteOp> {
        let mut ops = Vec::new();
        let source_dir = self.source_path_for(&level.dir);

        // When the mirrored parent is gone (or blocked by a file), nothing
        // in this level has a counterpart. Deciding that up front also
        // avoids per-entry stats that would fail with ENOTDIR instead of
        // NotFound when an ancestor on the source side is a file.
        let parent_is_dir = matches!(fs::metadata(&source_dir).await, Ok(meta) if meta.is_dir());
        if !parent_is_dir {
            if self.source_dir_vanished(&source_dir).await {
                for name in &level.files {
                    ops.push(DeleteOp::File(level.dir.join(name)));
                }
                for name in &level.subdirs {
                    ops.push(DeleteOp::Directory(level.dir.join(name)));
                }
            } else {
                self.sink.emit(SyncEvent::DeleteFailed {
                    path: level.dir.clone(),
                    detail: format!(
                        "could not verify source directory {}",
                        source_dir.display()
                    ),
                });
            }
            return ops;
        }

        for name in &level.files {
            let source = source_dir.join(name);
            let replica = level.dir.join(name);
            match fs::metadata(&source).await {
                Ok(meta) if meta.is_file() => {}
                Ok(_) => ops.push(DeleteOp::File(replica)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    ops.push(DeleteOp::File(replica));
                }
                Err(err) => {
                    // Could not verify the source side; keep the replica
                    // entry and let the next pass retry.
                    self.sink.emit(SyncEvent::DeleteFailed {
                        path: replica,
                        detail: format!("could not verify source entry: {err}"),
                    });
                }
            }
        }

        for name in &level.subdirs {
            let source = source_dir.join(name);
            let replica = level.dir.join(name);
            match fs::metadata(&source).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => ops.push(DeleteOp::Directory(replica)),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    ops.push(DeleteOp::Directory(replica));
                }
                Err(err) => {
                    self.sink.emit(SyncEvent::DeleteFailed {
                        path: replica,
                        detail: format!("could not verify source entry: {err}"),
                    });
                }
            }
        }

        ops
    }

    /// True when the mirrored source directory is definitively absent:
    /// some path component under the source root is missing or is not a
    /// directory. A stat failure that proves neither (permissions, say)
    /// returns false so the caller keeps the replica entries.
    async fn source_dir_vanished(&self, source_dir: &Path) -> bool {
        let Ok(rel) = source_dir.strip_prefix(&self.source_root) else {
            return false;
        };
        let mut probe = self.source_root.clone();
        for component in rel.components() {
            probe.push(component);
            match fs::metadata(&probe).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return true,
                Err(err) if err.kind() == ErrorKind::NotFound => return true,
                Err(_) => return false,
            }
        }
        false
    }
}

// ============================================================================
// Unit tests
// ============================================================================
