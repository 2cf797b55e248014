//! Fatal error taxonomy for a synchronization pass
//!
//! Only failures that make the whole pass meaningless surface as
//! [`EngineError`]: a missing source root, or an I/O error while reading
//! the trees being walked. Per-item failures (one fingerprint, one copy,
//! one deletion) are recoverable: they are emitted as events, recorded in
//! the pass summary, and naturally retried on the next pass because every
//! pass recomputes the full diff from current filesystem state.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a synchronization pass
#[derive(Debug, Error)]
pub enum EngineError {
    /// The source root does not exist; no meaningful work is definable
    #[error("source root does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The source root exists but is not a directory
    #[error("source root is not a directory: {}", .0.display())]
    SourceNotADirectory(PathBuf),

    /// An unrecoverable I/O error while walking a tree
    #[error("failed to walk directory tree at {}: {source}", .dir.display())]
    Walk {
        /// Root of the tree being walked when the error occurred
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O error at the pass level (e.g. creating the replica root)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
