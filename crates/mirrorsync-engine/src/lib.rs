//! MirrorSync Engine - One-way mirror synchronization
//!
//! Makes a replica directory tree an exact mirror of a source tree, one
//! pass at a time. A pass walks the source top-down creating directories
//! and copying new or modified files (in concurrency-bounded batches),
//! then walks the replica bottom-up deleting everything the source no
//! longer has.
//!
//! ## Modules
//!
//! - [`fingerprint`] - Streaming SHA-256 content digests
//! - [`walker`] - Level-at-a-time directory traversal, top-down or bottom-up
//! - [`planner`] - Classifies entries into create/copy/delete actions
//! - [`executor`] - Bounded-concurrency batch copying
//! - [`engine`] - Single-pass orchestration
//!
//! The engine is stateless between passes: every pass recomputes the full
//! diff from current filesystem state, so anything skipped or failed in one
//! pass is naturally retried on the next.

pub mod engine;
pub mod executor;
pub mod fingerprint;
pub mod planner;
pub mod walker;

pub use engine::{PassSummary, SyncEngine};
pub use fingerprint::{fingerprint_file, Fingerprint};
pub use planner::CopyTask;
pub use walker::{DirLevel, TreeWalker, WalkOrder};
