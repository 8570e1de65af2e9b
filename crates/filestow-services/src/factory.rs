//! Resolution of target keys to live drivers.

use crate::registry::ConfigRegistry;
use filestow_core::{DriverError, StorageTarget, TargetRef};
use filestow_storage::{create_driver, BackendDriver, DriverOptions};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type DriverCell = Arc<OnceCell<Arc<dyn BackendDriver>>>;

struct CacheEntry {
    /// Configuration the cell's driver is (or will be) built from.
    target: StorageTarget,
    cell: DriverCell,
}

/// One driver slot per target key.
///
/// The map lock is only held to find or replace a slot; construction happens
/// inside the slot's `OnceCell`, so concurrent first resolutions of one key
/// share a single construction while other keys proceed independently.
#[derive(Default)]
pub struct DriverCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl DriverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `target`, replaced when the cached configuration differs.
    async fn cell_for(&self, target: &StorageTarget) -> DriverCell {
        let mut entries = self.entries.lock().await;
        match entries.get(&target.key) {
            Some(entry) if entry.target == *target => entry.cell.clone(),
            _ => {
                let cell: DriverCell = Arc::new(OnceCell::new());
                entries.insert(
                    target.key.clone(),
                    CacheEntry {
                        target: target.clone(),
                        cell: cell.clone(),
                    },
                );
                cell
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        if self.entries.lock().await.remove(key).is_some() {
            tracing::debug!(key = %key, "Cached storage driver invalidated");
        }
    }

    pub async fn invalidate_all(&self) {
        self.entries.lock().await.clear();
    }

    /// Keys whose driver has been constructed.
    pub async fn constructed_keys(&self) -> Vec<String> {
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.cell.initialized())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

/// A target together with the driver serving it.
#[derive(Clone)]
pub struct ResolvedDriver {
    pub target: StorageTarget,
    pub driver: Arc<dyn BackendDriver>,
}

pub struct DriverFactory {
    registry: Arc<ConfigRegistry>,
    cache: Arc<DriverCache>,
    options: DriverOptions,
}

impl DriverFactory {
    pub fn new(registry: Arc<ConfigRegistry>, options: DriverOptions) -> Self {
        let cache = registry.cache();
        Self {
            registry,
            cache,
            options,
        }
    }

    /// Driver for `target`, constructing it on first use.
    pub async fn resolve(&self, target: &TargetRef) -> Result<ResolvedDriver, DriverError> {
        let config = match target {
            TargetRef::Primary => self.registry.get_primary().await,
            TargetRef::Key(key) => self.registry.get(key).await,
        }
        .ok_or_else(|| DriverError::UnknownTarget(target.to_string()))?;

        let cell = self.cache.cell_for(&config).await;
        let driver = cell
            .get_or_try_init(|| create_driver(&config, &self.options))
            .await?
            .clone();

        Ok(ResolvedDriver {
            target: config,
            driver,
        })
    }
}
