//! MirrorSync Core - Domain types and ports
//!
//! This crate contains everything the synchronization engine depends on
//! that is not itself filesystem work:
//!
//! - [`config`] - Typed configuration with loading, validation, and a builder
//! - [`errors`] - The fatal error taxonomy for a synchronization pass
//! - [`events`] - Semantic event definitions and the event-sink port
//!
//! # Architecture
//!
//! The engine never logs directly. Every component receives an
//! [`events::IEventSink`] and emits semantic events ("directory created",
//! "file copied", ...) through it; how those events are rendered is the
//! caller's concern. The default [`events::TracingSink`] adapter forwards
//! them to `tracing`, and process-wide subscriber setup lives in the CLI
//! binary, not here.

pub mod config;
pub mod errors;
pub mod events;

pub use config::{Config, ConfigBuilder};
pub use errors::EngineError;
pub use events::{CopyReason, IEventSink, MemorySink, Severity, SyncEvent, TracingSink};
