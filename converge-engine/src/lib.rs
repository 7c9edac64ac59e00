//! # converge-engine
//!
//! Reconciliation engine: given a remote manifest of `(global_id,
//! fingerprint)` rows per resource type, converge the local store with the
//! minimal set of create/update/delete operations.
//!
//! Call [`SyncExecutor::run`] to apply a sync run, or [`preview_type`] for a
//! read-only view of what a run would change.

pub mod error;
pub mod executor;
pub mod preview;
pub mod report;
pub mod resolver;
pub mod testing;

pub use error::SyncError;
pub use executor::{SyncExecutor, SyncOptions};
pub use preview::{preview_type, PlannedChange, TypePreview};
pub use report::{MemorySink, Operation, ReportSink, StdoutSink, SyncFailure, SyncResult};
pub use resolver::{resolve_creation, CreateDecision};
