//! Error types for converge-engine.

use thiserror::Error;

use converge_client::ClientError;
use converge_core::types::TypeName;
use converge_core::StoreError;

/// Fatal errors out of a sync run or preview.
///
/// Per-entry failures are never fatal: the executor records them in the run
/// result and continues. Only a manifest fetch failure aborts the run; the
/// read-only preview additionally treats store reads as fatal since nothing
/// is being applied.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Manifest client failure (transport, non-2xx other than 404).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Store failure during a read-only preview.
    #[error("resource store error: {0}")]
    Store(#[from] StoreError),

    /// A requested resource type has no local descriptor (preview only; the
    /// executor records this and skips the type).
    #[error("resource type {0} is not registered locally")]
    UnknownType(TypeName),
}
