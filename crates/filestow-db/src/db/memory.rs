//! In-memory record store and target source.
//!
//! Used by tests and by processes that run without a database. Contents are
//! lost on drop.

use crate::records::FileRecordStore;
use crate::targets::StorageTargetSource;
use async_trait::async_trait;
use filestow_core::{ConfigError, FileRecord, FileRecordPatch, RecordStoreError, StorageTarget};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryFileRecordStore {
    records: RwLock<HashMap<Uuid, FileRecord>>,
}

impl InMemoryFileRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, oldest first.
    pub async fn all(&self) -> Vec<FileRecord> {
        let mut records: Vec<FileRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        records
    }
}

#[async_trait]
impl FileRecordStore for InMemoryFileRecordStore {
    async fn create(&self, record: &FileRecord) -> Result<Uuid, RecordStoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(RecordStoreError::Conflict(format!(
                "record {} already exists",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(record.id)
    }

    async fn find_by_checksum(
        &self,
        storage_key: &str,
        checksum: &str,
    ) -> Result<Option<FileRecord>, RecordStoreError> {
        Ok(self
            .list_by_checksum(storage_key, checksum)
            .await?
            .into_iter()
            .next())
    }

    async fn list_by_checksum(
        &self,
        storage_key: &str,
        checksum: &str,
    ) -> Result<Vec<FileRecord>, RecordStoreError> {
        let records = self.records.read().await;
        let mut hits: Vec<FileRecord> = records
            .values()
            .filter(|r| {
                r.storage_key == storage_key
                    && r.checksum == checksum
                    && !r.in_trash
                    && r.purged_at.is_none()
            })
            .cloned()
            .collect();
        hits.sort_by_key(|r| (r.created_at, r.id));
        Ok(hits)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &FileRecordPatch,
    ) -> Result<FileRecord, RecordStoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(RecordStoreError::NotFound(id))?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn count_active_by_storage_key(
        &self,
        storage_key: &str,
    ) -> Result<i64, RecordStoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.storage_key == storage_key && r.purged_at.is_none())
            .count() as i64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, RecordStoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }
}

/// Target source backed by a map. Disabled targets are kept but not listed.
#[derive(Debug, Default)]
pub struct InMemoryTargetSource {
    targets: RwLock<BTreeMap<String, StorageTarget>>,
}

impl InMemoryTargetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets(targets: impl IntoIterator<Item = StorageTarget>) -> Self {
        Self {
            targets: RwLock::new(targets.into_iter().map(|t| (t.key.clone(), t)).collect()),
        }
    }

    /// Every stored target, enabled or not, sorted by key.
    pub async fn all(&self) -> Vec<StorageTarget> {
        self.targets.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl StorageTargetSource for InMemoryTargetSource {
    async fn list_enabled(&self) -> Result<Vec<StorageTarget>, ConfigError> {
        Ok(self
            .targets
            .read()
            .await
            .values()
            .filter(|t| t.enabled)
            .cloned()
            .collect())
    }

    async fn save(&self, targets: &[StorageTarget]) -> Result<(), ConfigError> {
        let mut stored = self.targets.write().await;
        for target in targets {
            stored.insert(target.key.clone(), target.clone());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ConfigError> {
        self.targets.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use filestow_core::BackendKind;

    fn record(key: &str, checksum: &str) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            storage_key: key.into(),
            original_name: "a.txt".into(),
            content_type: "text/plain".into(),
            size_bytes: 1,
            checksum: checksum.into(),
            primary_path: format!("2026/10/18/{}.txt", checksum),
            derivative_path: None,
            in_trash: false,
            created_at: Utc::now(),
            deleted_at: None,
            purged_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_checksum_skips_trashed_and_prefers_oldest() {
        let store = InMemoryFileRecordStore::new();
        let mut older = record("disk", "abc");
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = record("disk", "abc");
        let mut trashed = record("disk", "abc");
        trashed.in_trash = true;
        trashed.created_at = Utc::now() - Duration::hours(1);

        for r in [&older, &newer, &trashed] {
            store.create(r).await.unwrap();
        }

        let hit = store.find_by_checksum("disk", "abc").await.unwrap().unwrap();
        assert_eq!(hit.id, older.id);
        assert!(store.find_by_checksum("other", "abc").await.unwrap().is_none());
        assert_eq!(store.list_by_checksum("disk", "abc").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_count() {
        let store = InMemoryFileRecordStore::new();
        let a = record("disk", "a");
        let b = record("disk", "b");
        store.create(&a).await.unwrap();
        store.create(&b).await.unwrap();

        let trashed = store
            .update(a.id, &FileRecordPatch::trashed(Utc::now()))
            .await
            .unwrap();
        assert!(trashed.in_trash);
        assert_eq!(store.count_active_by_storage_key("disk").await.unwrap(), 2);

        store
            .update(b.id, &FileRecordPatch::purged(Utc::now()))
            .await
            .unwrap();
        assert_eq!(store.count_active_by_storage_key("disk").await.unwrap(), 1);

        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update(missing, &FileRecordPatch::restored()).await,
            Err(RecordStoreError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let store = InMemoryFileRecordStore::new();
        let a = record("disk", "a");
        store.create(&a).await.unwrap();
        assert!(matches!(
            store.create(&a).await,
            Err(RecordStoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_target_source_lists_enabled_only() {
        let source = InMemoryTargetSource::with_targets([
            StorageTarget::new("b", BackendKind::Local),
            StorageTarget::new("a", BackendKind::Nas).disabled(),
        ]);
        let keys: Vec<_> = source
            .list_enabled()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.key)
            .collect();
        assert_eq!(keys, vec!["b".to_string()]);

        source.delete("b").await.unwrap();
        source.delete("b").await.unwrap();
        assert_eq!(source.all().await.len(), 1);
    }
}
