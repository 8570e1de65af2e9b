//! File record store contract.

use async_trait::async_trait;
use filestow_core::{FileRecord, FileRecordPatch, RecordStoreError};
use uuid::Uuid;

/// Durable metadata for stored payloads.
///
/// Implementations must be safe to share across concurrent uploads. Dedup
/// lookups are best-effort: two concurrent `create` calls for identical
/// content may both succeed unless the store enforces uniqueness itself, in
/// which case the loser reports `RecordStoreError::Conflict`.
#[async_trait]
pub trait FileRecordStore: Send + Sync {
    /// Persist a new record and return its id.
    async fn create(&self, record: &FileRecord) -> Result<Uuid, RecordStoreError>;

    /// Oldest record on `storage_key` with `checksum` that is neither trashed
    /// nor purged.
    async fn find_by_checksum(
        &self,
        storage_key: &str,
        checksum: &str,
    ) -> Result<Option<FileRecord>, RecordStoreError>;

    /// Every active record on `storage_key` with `checksum`, oldest first.
    async fn list_by_checksum(
        &self,
        storage_key: &str,
        checksum: &str,
    ) -> Result<Vec<FileRecord>, RecordStoreError>;

    /// Apply `patch` and return the updated record.
    async fn update(&self, id: Uuid, patch: &FileRecordPatch)
        -> Result<FileRecord, RecordStoreError>;

    /// Records on `storage_key` whose bytes still exist (active or trashed).
    async fn count_active_by_storage_key(&self, storage_key: &str)
        -> Result<i64, RecordStoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, RecordStoreError>;
}
