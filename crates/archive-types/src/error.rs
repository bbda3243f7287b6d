// Copyright (c) Archivist Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for the replication and integrity engine.
///
/// Variant shape mirrors spec §7: each kind is raised at a specific
/// point in the Adapter / Ingester / Adapter Manager call graph, and
/// most are caught and converted into repair attempts rather than
/// propagated. Only the kinds that repair cannot resolve reach a
/// Façade caller.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("checksum mismatch for resource {uuid} on adapter `{adapter_id}`: expected {expected}, got {actual}")]
    ChecksumMismatch {
        uuid: Uuid,
        adapter_id: String,
        expected: String,
        actual: String,
    },

    #[error("no copy of resource {0} exists on this adapter")]
    NoCopyExists(Uuid),

    #[error("resource {0} is not ingested")]
    ResourceNotIngested(Uuid),

    #[error("storage failed: {0}")]
    StorageFailed(String),

    #[error("restoration of resource {uuid} failed: {reason}")]
    RestorationFailed { uuid: Uuid, reason: String },

    #[error("failed to create adapter `{adapter_id}` of type `{adapter_type}`: {reason}")]
    AdapterCreationFailed {
        adapter_id: String,
        adapter_type: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("level `{0}` not found")]
    LevelNotFound(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
