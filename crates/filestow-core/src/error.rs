//! Error types module
//!
//! The storage engine reports failures through four enums, one per layer:
//! `ConfigError` for the target registry, `DriverError` for driver resolution,
//! `StorageError` for byte movement and coordination, and `LoadError` for
//! startup loaders. `RecordStoreError` is what a metadata store reports back.

use uuid::Uuid;

use crate::storage_types::BackendKind;

/// Errors raised by the storage target registry and its configuration source.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No enabled storage target is marked primary")]
    NoPrimary,

    #[error("Multiple enabled storage targets are marked primary: {}", .0.join(", "))]
    MultiplePrimary(Vec<String>),

    #[error("Invalid settings for storage target '{key}': {reason}")]
    InvalidSettings { key: String, reason: String },

    #[error("Storage target '{key}' is in use: {reason}")]
    InUse { key: String, reason: String },

    #[error("Unknown storage target: {0}")]
    UnknownTarget(String),

    #[error("Configuration source error: {0}")]
    Source(String),
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidSettings {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while resolving a storage target to a live driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Unknown storage target: {0}")]
    UnknownTarget(String),

    #[error("Failed to construct {kind} driver for '{key}': {cause}")]
    ConstructionFailed {
        key: String,
        kind: BackendKind,
        cause: String,
    },
}

/// Errors reported by a `FileRecordStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("File record not found: {0}")]
    NotFound(Uuid),

    #[error("Conflicting file record: {0}")]
    Conflict(String),

    #[error("Record store error: {0}")]
    Backend(String),
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for RecordStoreError {
    fn from(err: sqlx::Error) -> Self {
        let unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");
        if unique_violation {
            RecordStoreError::Conflict(err.to_string())
        } else {
            RecordStoreError::Backend(err.to_string())
        }
    }
}

/// Storage operation errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Local filesystem failure. Never retried.
    #[error("Local filesystem error: {0}")]
    Local(#[from] std::io::Error),

    /// A remote backend kept failing after the retry budget was spent.
    #[error("Backend unavailable after {attempts} attempt(s) during {operation}: {cause}")]
    Unavailable {
        operation: &'static str,
        attempts: u32,
        cause: String,
    },

    #[error("File record {0} is not in the trash")]
    NotInTrash(Uuid),

    #[error("{operation} is not supported by the {kind} backend")]
    Unsupported {
        operation: &'static str,
        kind: BackendKind,
    },

    /// Permanent (non-transient) failure reported by a remote backend.
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Stored object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("File record {0} has been purged")]
    Purged(Uuid),

    #[error("Checksum mismatch: declared {declared}, computed {computed}")]
    ChecksumMismatch { declared: String, computed: String },

    #[error("Storage configuration has not been loaded; refusing upload traffic")]
    NotReady,

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Record(#[from] RecordStoreError),

    /// The cleanup after a failed operation failed too; both causes are kept
    /// so the orphaned artifact is not hidden.
    #[error("{cause}; compensation also failed: {compensation}")]
    CompensationFailed {
        cause: Box<StorageError>,
        compensation: Box<StorageError>,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by startup loaders.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Loader '{0}' was aborted before completing")]
    Aborted(String),
}
