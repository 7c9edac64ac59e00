//! Error types for converge-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{GlobalId, NaturalKey, TypeName};

/// All errors that can arise from resource store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (store documents).
    #[error("resource store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A resource with this global id already exists.
    #[error("duplicate global id {global_id}")]
    DuplicateGlobalId { global_id: GlobalId },

    /// Another resource of this type already holds the natural key.
    #[error("duplicate natural key {key} for {type_name}")]
    DuplicateNaturalKey { type_name: TypeName, key: NaturalKey },

    /// No resource with this global id exists.
    #[error("no resource with global id {global_id}")]
    NotFound { global_id: GlobalId },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Contract violations in the diff utility. Always propagated, never
/// swallowed: they mean the caller broke the diff contract.
#[derive(Debug, Error)]
pub enum DiffError {
    /// `old` and `new` are resources of different kinds.
    #[error("old and new must be of the same kind: {old} vs {new}")]
    TypeMismatch { old: TypeName, new: TypeName },

    /// A non-null argument's type is not in the registry.
    #[error("{name} is not a registered resource type")]
    UnknownType { name: TypeName },
}
