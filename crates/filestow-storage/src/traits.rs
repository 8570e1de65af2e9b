//! Backend driver abstraction
//!
//! This module defines the `BackendDriver` trait every storage medium implements.

use async_trait::async_trait;
use bytes::Bytes;
use filestow_core::{BackendKind, StorageResult};

/// Where a payload lives inside one backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoredLocation {
    /// Relative path inside the backend, e.g. `2026/10/18/{md5}.png`.
    pub path: String,
    /// Size of the stored payload, when known.
    pub size_bytes: Option<u64>,
    /// Sub-namespace of the trash this artifact is moved into. Two owners of
    /// the same live path get separate trash copies.
    pub trash_scope: Option<String>,
}

impl StoredLocation {
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size_bytes: None,
            trash_scope: None,
        }
    }

    pub fn in_trash_scope(mut self, scope: impl Into<String>) -> Self {
        self.trash_scope = Some(scope.into());
        self
    }

    /// Path of the trashed copy, relative to the trash namespace.
    pub fn trash_relative(&self) -> String {
        match self.trash_scope.as_deref() {
            Some(scope) => format!("{}/{}", scope, self.path),
            None => self.path.clone(),
        }
    }
}

/// Uniform capability set of a storage medium.
///
/// Implementations are shared across concurrent callers and must be
/// `Send + Sync`. I/O methods carry no implicit timeout; callers that drop the
/// returned future cancel the operation, and a cancelled `store` leaves no
/// partial artifact behind.
#[async_trait]
pub trait BackendDriver: Send + Sync {
    /// Backend kind this driver talks to.
    fn kind(&self) -> BackendKind;

    /// Write `payload` at `relative_path`, atomically from the caller's view:
    /// a failed write leaves nothing visible to later reads.
    async fn store(&self, relative_path: &str, payload: Bytes) -> StorageResult<StoredLocation>;

    /// Read back the bytes of a live (non-trashed) artifact.
    async fn fetch(&self, location: &StoredLocation) -> StorageResult<Bytes>;

    /// Caller-usable reference to the artifact. Pure, performs no I/O.
    fn fetch_url(&self, location: &StoredLocation) -> String;

    /// Relocate the artifact into the backend's trash namespace.
    async fn move_to_trash(&self, location: &StoredLocation) -> StorageResult<()>;

    /// Put a copy into the trash namespace and leave the live artifact alone.
    async fn copy_to_trash(&self, location: &StoredLocation) -> StorageResult<()>;

    /// Inverse of `move_to_trash`. An existing live artifact is replaced.
    async fn restore_from_trash(&self, location: &StoredLocation) -> StorageResult<()>;

    /// Remove the artifact's bytes, live and trashed. Missing objects are not an error.
    async fn purge(&self, location: &StoredLocation) -> StorageResult<()>;

    /// Remove only the trashed copy. Missing objects are not an error.
    async fn purge_trashed(&self, location: &StoredLocation) -> StorageResult<()>;

    /// Bytes currently occupied on the medium.
    async fn used_space(&self) -> StorageResult<i64>;
}
