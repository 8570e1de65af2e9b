//! Registry of configured storage targets.
//!
//! Readers clone an `Arc<Snapshot>` under a briefly held read lock and never
//! wait on I/O. Writers are serialized by `write_lock`, build a new snapshot
//! off to the side, persist through the `StorageTargetSource`, and only then
//! swap the snapshot in. A write that fails leaves the previous snapshot in
//! place.

use crate::factory::DriverCache;
use filestow_core::{ConfigError, StorageTarget};
use filestow_db::{FileRecordStore, StorageTargetSource};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Immutable view of the enabled targets.
#[derive(Debug, Default)]
struct Snapshot {
    targets: BTreeMap<String, StorageTarget>,
    primary: Option<String>,
    loaded: bool,
}

impl Snapshot {
    /// Validate `targets` and require exactly one primary.
    fn build(
        targets: impl IntoIterator<Item = StorageTarget>,
        loaded: bool,
    ) -> Result<Self, ConfigError> {
        let mut map = BTreeMap::new();
        for target in targets.into_iter().filter(|t| t.enabled) {
            target.validate()?;
            map.insert(target.key.clone(), target);
        }

        let primaries: Vec<String> = map
            .values()
            .filter(|t| t.is_primary)
            .map(|t| t.key.clone())
            .collect();
        let primary = match primaries.len() {
            0 => return Err(ConfigError::NoPrimary),
            1 => primaries.into_iter().next(),
            _ => return Err(ConfigError::MultiplePrimary(primaries)),
        };

        Ok(Snapshot {
            targets: map,
            primary,
            loaded,
        })
    }
}

pub struct ConfigRegistry {
    source: Arc<dyn StorageTargetSource>,
    records: Arc<dyn FileRecordStore>,
    snapshot: RwLock<Arc<Snapshot>>,
    write_lock: Mutex<()>,
    cache: Arc<DriverCache>,
}

impl ConfigRegistry {
    /// Create an empty, not yet loaded registry.
    pub fn new(source: Arc<dyn StorageTargetSource>, records: Arc<dyn FileRecordStore>) -> Self {
        Self {
            source,
            records,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            write_lock: Mutex::new(()),
            cache: Arc::new(DriverCache::new()),
        }
    }

    /// Driver cache invalidated by every configuration change.
    pub fn cache(&self) -> Arc<DriverCache> {
        self.cache.clone()
    }

    async fn current(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    async fn swap(&self, next: Snapshot) {
        *self.snapshot.write().await = Arc::new(next);
    }

    /// Replace the snapshot with the enabled targets of the source.
    pub async fn load(&self) -> Result<(), ConfigError> {
        let _writer = self.write_lock.lock().await;
        let start = std::time::Instant::now();

        let targets = self.source.list_enabled().await?;
        let snapshot = Snapshot::build(targets, true).inspect_err(|e| {
            tracing::error!(error = %e, "Storage configuration rejected");
        })?;
        let count = snapshot.targets.len();
        let primary = snapshot.primary.clone().unwrap_or_default();

        self.swap(snapshot).await;
        self.cache.invalidate_all().await;

        tracing::info!(
            targets = count,
            primary = %primary,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage configuration loaded"
        );
        Ok(())
    }

    /// Whether a `load` has ever succeeded.
    pub async fn is_loaded(&self) -> bool {
        self.current().await.loaded
    }

    pub async fn get(&self, key: &str) -> Option<StorageTarget> {
        self.current().await.targets.get(key).cloned()
    }

    pub async fn get_primary(&self) -> Option<StorageTarget> {
        let snapshot = self.current().await;
        snapshot
            .primary
            .as_ref()
            .and_then(|key| snapshot.targets.get(key))
            .cloned()
    }

    /// Enabled targets sorted by key.
    pub async fn list(&self) -> Vec<StorageTarget> {
        self.current().await.targets.values().cloned().collect()
    }

    /// Insert or replace a target. Promoting a target demotes the current
    /// primary in the same write; any change that would leave no enabled
    /// primary is rejected with `NoPrimary`.
    pub async fn upsert(&self, target: StorageTarget) -> Result<(), ConfigError> {
        target.validate()?;

        let _writer = self.write_lock.lock().await;
        let current = self.current().await;
        let mut next = current.targets.clone();
        let mut writes = Vec::with_capacity(2);

        if target.enabled && target.is_primary {
            if let Some(previous) = current.primary.as_ref().filter(|k| **k != target.key) {
                if let Some(existing) = next.get_mut(previous) {
                    existing.is_primary = false;
                    writes.push(existing.clone());
                }
            }
        }
        if target.enabled {
            next.insert(target.key.clone(), target.clone());
        } else {
            next.remove(&target.key);
        }
        writes.push(target.clone());

        let snapshot = Snapshot::build(next.into_values(), current.loaded)?;

        self.source.save(&writes).await?;
        self.swap(snapshot).await;
        for written in &writes {
            self.cache.invalidate(&written.key).await;
        }

        tracing::info!(
            key = %target.key,
            backend = %target.backend_type,
            is_primary = target.is_primary,
            enabled = target.enabled,
            demoted = writes.len() > 1,
            "Storage target saved"
        );
        Ok(())
    }

    /// Remove a target that is neither primary nor referenced by live records.
    pub async fn remove(&self, key: &str) -> Result<(), ConfigError> {
        let _writer = self.write_lock.lock().await;
        let current = self.current().await;

        if !current.targets.contains_key(key) {
            return Err(ConfigError::UnknownTarget(key.to_string()));
        }
        if current.primary.as_deref() == Some(key) {
            return Err(ConfigError::InUse {
                key: key.to_string(),
                reason: "it is the primary target".to_string(),
            });
        }

        let references = self
            .records
            .count_active_by_storage_key(key)
            .await
            .map_err(|e| ConfigError::Source(e.to_string()))?;
        if references > 0 {
            return Err(ConfigError::InUse {
                key: key.to_string(),
                reason: format!("{} file record(s) still reference it", references),
            });
        }

        let mut next = current.targets.clone();
        next.remove(key);
        let snapshot = Snapshot::build(next.into_values(), current.loaded)?;

        self.source.delete(key).await?;
        self.swap(snapshot).await;
        self.cache.invalidate(key).await;

        tracing::info!(key = %key, "Storage target removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestow_core::settings_keys as keys;
    use filestow_core::BackendKind;
    use filestow_db::{InMemoryFileRecordStore, InMemoryTargetSource};

    fn local(key: &str) -> StorageTarget {
        StorageTarget::new(key, BackendKind::Local).with_setting(keys::UPLOAD_PATH, "/tmp/filestow")
    }

    fn registry(targets: Vec<StorageTarget>) -> (ConfigRegistry, Arc<InMemoryTargetSource>) {
        let source = Arc::new(InMemoryTargetSource::with_targets(targets));
        let registry = ConfigRegistry::new(
            source.clone(),
            Arc::new(InMemoryFileRecordStore::new()),
        );
        (registry, source)
    }

    #[tokio::test]
    async fn test_load_requires_exactly_one_primary() {
        let (none, _) = registry(vec![local("a"), local("b")]);
        assert!(matches!(none.load().await, Err(ConfigError::NoPrimary)));
        assert!(!none.is_loaded().await);

        let (two, _) = registry(vec![local("a").primary(), local("b").primary()]);
        match two.load().await {
            Err(ConfigError::MultiplePrimary(keys)) => assert_eq!(keys, vec!["a", "b"]),
            other => panic!("unexpected result: {:?}", other),
        }

        let (one, _) = registry(vec![local("a").primary(), local("b")]);
        one.load().await.unwrap();
        assert!(one.is_loaded().await);
        assert_eq!(one.get_primary().await.unwrap().key, "a");
    }

    #[tokio::test]
    async fn test_disabled_primary_does_not_count() {
        let (registry, _) = registry(vec![local("a").primary().disabled(), local("b")]);
        assert!(matches!(registry.load().await, Err(ConfigError::NoPrimary)));
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected_on_load() {
        let (registry, _) = registry(vec![
            local("a").primary(),
            StorageTarget::new("s3", BackendKind::ObjectStoreA),
        ]);
        assert!(matches!(
            registry.load().await,
            Err(ConfigError::InvalidSettings { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let (registry, source) = registry(vec![local("a").primary()]);
        registry.load().await.unwrap();

        source.save(&[local("b").primary()]).await.unwrap();
        assert!(registry.load().await.is_err());
        assert_eq!(registry.get_primary().await.unwrap().key, "a");
        assert!(registry.get("b").await.is_none());
    }

    #[tokio::test]
    async fn test_promotion_demotes_previous_primary() {
        let (registry, source) = registry(vec![local("a").primary(), local("b")]);
        registry.load().await.unwrap();

        registry.upsert(local("b").primary()).await.unwrap();
        assert_eq!(registry.get_primary().await.unwrap().key, "b");
        assert!(!registry.get("a").await.unwrap().is_primary);

        let persisted = source.all().await;
        let primaries: Vec<_> = persisted.iter().filter(|t| t.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].key, "b");
    }

    #[tokio::test]
    async fn test_upsert_cannot_drop_primary() {
        let (registry, source) = registry(vec![local("a").primary()]);
        registry.load().await.unwrap();

        assert!(matches!(
            registry.upsert(local("a")).await,
            Err(ConfigError::NoPrimary)
        ));
        assert!(matches!(
            registry.upsert(local("a").primary().disabled()).await,
            Err(ConfigError::NoPrimary)
        ));
        assert!(source.all().await[0].is_primary);
    }

    #[tokio::test]
    async fn test_upsert_validates_before_writing() {
        let (registry, source) = registry(vec![local("a").primary()]);
        registry.load().await.unwrap();

        let err = registry
            .upsert(StorageTarget::new("nas", BackendKind::Nas))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mountPoint"));
        assert_eq!(source.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_rules() {
        let (registry, source) = registry(vec![local("a").primary(), local("b")]);
        registry.load().await.unwrap();

        assert!(matches!(
            registry.remove("a").await,
            Err(ConfigError::InUse { .. })
        ));
        assert!(matches!(
            registry.remove("zzz").await,
            Err(ConfigError::UnknownTarget(_))
        ));

        registry.remove("b").await.unwrap();
        assert!(registry.get("b").await.is_none());
        assert_eq!(source.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let (registry, _) = registry(vec![local("c"), local("a").primary(), local("b")]);
        registry.load().await.unwrap();
        let keys: Vec<_> = registry.list().await.into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
}
