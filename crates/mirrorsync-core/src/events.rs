//! Semantic sync events and the event-sink port
//!
//! The engine reports what it does as a stream of [`SyncEvent`]s through an
//! injected [`IEventSink`]. It never assumes a particular log backend; it
//! only requires that the sink can render events at `debug`, `info`, and
//! `error` severity.
//!
//! Two adapters are provided:
//!
//! - [`TracingSink`] - forwards events to the `tracing` macros (the default
//!   for the CLI binary, whose subscriber setup decides console/file output)
//! - [`MemorySink`] - records events in memory, for tests and inspection

use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, error, info};

// ============================================================================
// Severity
// ============================================================================

/// Severity level of a [`SyncEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Error,
}

// ============================================================================
// CopyReason
// ============================================================================

/// Why a file is being copied into the replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    /// The file does not exist in the replica
    New,
    /// The file exists in the replica but its content differs
    Modified,
}

impl fmt::Display for CopyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyReason::New => write!(f, "new"),
            CopyReason::Modified => write!(f, "modified"),
        }
    }
}

// ============================================================================
// SyncEvent
// ============================================================================

/// A semantic action taken (or attempted) during a synchronization pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A directory missing from the replica was created
    DirectoryCreated { path: PathBuf },
    /// A file copy is being performed, with the reason for it
    FileCopied {
        source: PathBuf,
        dest: PathBuf,
        reason: CopyReason,
    },
    /// A replica file with no source counterpart was deleted
    FileDeleted { path: PathBuf },
    /// A replica directory with no source counterpart was deleted
    DirectoryDeleted { path: PathBuf },
    /// A file's fingerprints matched; nothing to do
    FileSkipped { path: PathBuf },
    /// A stale replica file was removed ahead of a modified re-copy,
    /// so old content cannot outlive a failed copy
    StaleFileRemoved { path: PathBuf },
    /// A fingerprint could not be computed; the file is re-copied because
    /// "unmodified" cannot be confirmed
    FingerprintFailed { path: PathBuf, detail: String },
    /// A single copy task failed; siblings in the batch continue
    CopyFailed {
        source: PathBuf,
        dest: PathBuf,
        detail: String,
    },
    /// A single deletion failed; it will be retried on the next pass
    DeleteFailed { path: PathBuf, detail: String },
    /// A directory could not be created in the replica
    DirectoryCreateFailed { path: PathBuf, detail: String },
    /// Source and replica disagree about whether this path is a file or
    /// a directory
    TypeClash { path: PathBuf },
}

impl SyncEvent {
    /// The severity at which this event should be rendered
    pub fn severity(&self) -> Severity {
        match self {
            SyncEvent::FileSkipped { .. } => Severity::Debug,
            SyncEvent::DirectoryCreated { .. }
            | SyncEvent::FileCopied { .. }
            | SyncEvent::FileDeleted { .. }
            | SyncEvent::DirectoryDeleted { .. }
            | SyncEvent::StaleFileRemoved { .. } => Severity::Info,
            SyncEvent::FingerprintFailed { .. }
            | SyncEvent::CopyFailed { .. }
            | SyncEvent::DeleteFailed { .. }
            | SyncEvent::DirectoryCreateFailed { .. }
            | SyncEvent::TypeClash { .. } => Severity::Error,
        }
    }
}

// ============================================================================
// IEventSink port
// ============================================================================

/// Port for rendering sync events
///
/// Implementations may be called from concurrent copy workers and must be
/// thread-safe.
pub trait IEventSink: Send + Sync {
    /// Renders a single event
    fn emit(&self, event: SyncEvent);
}

// ============================================================================
// TracingSink adapter
// ============================================================================

/// Event sink that forwards events to the `tracing` macros
///
/// Severity maps to `debug!` / `info!` / `error!`. The subscriber installed
/// by the process decides where the records end up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl IEventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        match &event {
            SyncEvent::DirectoryCreated { path } => {
                info!(path = %path.display(), "created directory in replica");
            }
            SyncEvent::FileCopied {
                source,
                dest,
                reason,
            } => {
                info!(
                    source = %source.display(),
                    dest = %dest.display(),
                    reason = %reason,
                    "copying file"
                );
            }
            SyncEvent::FileDeleted { path } => {
                info!(path = %path.display(), "deleted file absent from source");
            }
            SyncEvent::DirectoryDeleted { path } => {
                info!(path = %path.display(), "deleted directory absent from source");
            }
            SyncEvent::FileSkipped { path } => {
                debug!(path = %path.display(), "file unmodified, skipping");
            }
            SyncEvent::StaleFileRemoved { path } => {
                info!(path = %path.display(), "removed stale replica file before re-copy");
            }
            SyncEvent::FingerprintFailed { path, detail } => {
                error!(path = %path.display(), %detail, "fingerprint failed, re-copying file");
            }
            SyncEvent::CopyFailed {
                source,
                dest,
                detail,
            } => {
                error!(
                    source = %source.display(),
                    dest = %dest.display(),
                    %detail,
                    "copy failed"
                );
            }
            SyncEvent::DeleteFailed { path, detail } => {
                error!(path = %path.display(), %detail, "deletion failed, left for next pass");
            }
            SyncEvent::DirectoryCreateFailed { path, detail } => {
                error!(path = %path.display(), %detail, "could not create directory");
            }
            SyncEvent::TypeClash { path } => {
                error!(
                    path = %path.display(),
                    "source and replica entry types differ (file vs directory)"
                );
            }
        }
    }
}

// ============================================================================
// MemorySink adapter
// ============================================================================

/// Event sink that records every event, for tests and inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all events emitted so far
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Counts recorded events matching `predicate`
    pub fn count_matching(&self, predicate: impl Fn(&SyncEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    /// Discards all recorded events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl IEventSink for MemorySink {
    fn emit(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_reason_display() {
        assert_eq!(CopyReason::New.to_string(), "new");
        assert_eq!(CopyReason::Modified.to_string(), "modified");
    }

    #[test]
    fn skipped_is_debug_severity() {
        let event = SyncEvent::FileSkipped {
            path: PathBuf::from("/r/a.txt"),
        };
        assert_eq!(event.severity(), Severity::Debug);
    }

    #[test]
    fn actions_are_info_severity() {
        let events = [
            SyncEvent::DirectoryCreated {
                path: PathBuf::from("/r/sub"),
            },
            SyncEvent::FileCopied {
                source: PathBuf::from("/s/a.txt"),
                dest: PathBuf::from("/r/a.txt"),
                reason: CopyReason::New,
            },
            SyncEvent::FileDeleted {
                path: PathBuf::from("/r/b.txt"),
            },
            SyncEvent::DirectoryDeleted {
                path: PathBuf::from("/r/old"),
            },
            SyncEvent::StaleFileRemoved {
                path: PathBuf::from("/r/a.txt"),
            },
        ];
        for event in events {
            assert_eq!(event.severity(), Severity::Info, "{event:?}");
        }
    }

    #[test]
    fn failures_are_error_severity() {
        let events = [
            SyncEvent::FingerprintFailed {
                path: PathBuf::from("/s/a.txt"),
                detail: "io".into(),
            },
            SyncEvent::CopyFailed {
                source: PathBuf::from("/s/a.txt"),
                dest: PathBuf::from("/r/a.txt"),
                detail: "io".into(),
            },
            SyncEvent::DeleteFailed {
                path: PathBuf::from("/r/a.txt"),
                detail: "io".into(),
            },
            SyncEvent::DirectoryCreateFailed {
                path: PathBuf::from("/r/sub"),
                detail: "io".into(),
            },
            SyncEvent::TypeClash {
                path: PathBuf::from("/r/a"),
            },
        ];
        for event in events {
            assert_eq!(event.severity(), Severity::Error, "{event:?}");
        }
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.emit(SyncEvent::DirectoryCreated {
            path: PathBuf::from("/r/sub"),
        });
        sink.emit(SyncEvent::FileDeleted {
            path: PathBuf::from("/r/b.txt"),
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], SyncEvent::DirectoryCreated { .. }));
        assert!(matches!(events[1], SyncEvent::FileDeleted { .. }));
    }

    #[test]
    fn memory_sink_count_and_clear() {
        let sink = MemorySink::new();
        sink.emit(SyncEvent::FileSkipped {
            path: PathBuf::from("/r/a.txt"),
        });
        sink.emit(SyncEvent::FileSkipped {
            path: PathBuf::from("/r/b.txt"),
        });

        assert_eq!(
            sink.count_matching(|e| matches!(e, SyncEvent::FileSkipped { .. })),
            2
        );

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn tracing_sink_accepts_every_variant() {
        // No subscriber installed; emitting must still be safe.
        let sink = TracingSink::new();
        sink.emit(SyncEvent::FileCopied {
            source: PathBuf::from("/s/a.txt"),
            dest: PathBuf::from("/r/a.txt"),
            reason: CopyReason::Modified,
        });
        sink.emit(SyncEvent::TypeClash {
            path: PathBuf::from("/r/a"),
        });
    }
}
