use super::StartupLoader;
use async_trait::async_trait;
use filestow_core::{LoadError, TargetRef};
use filestow_services::{ConfigRegistry, StorageCoordinator};
use std::sync::Arc;

pub const STORAGE_CONFIG_PRIORITY: i32 = 10;
pub const DRIVER_WARMUP_PRIORITY: i32 = 20;

/// Populates the registry from the persisted target configuration.
pub struct StorageConfigLoader {
    registry: Arc<ConfigRegistry>,
}

impl StorageConfigLoader {
    pub fn new(registry: Arc<ConfigRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StartupLoader for StorageConfigLoader {
    fn name(&self) -> &str {
        "storage-config"
    }

    fn priority(&self) -> i32 {
        STORAGE_CONFIG_PRIORITY
    }

    fn critical(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<(), LoadError> {
        self.registry.load().await?;
        Ok(())
    }
}

/// Builds the primary target's driver in the background so the first upload
/// does not pay for construction.
pub struct DriverWarmupLoader {
    coordinator: Arc<StorageCoordinator>,
}

impl DriverWarmupLoader {
    pub fn new(coordinator: Arc<StorageCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl StartupLoader for DriverWarmupLoader {
    fn name(&self) -> &str {
        "driver-warmup"
    }

    fn priority(&self) -> i32 {
        DRIVER_WARMUP_PRIORITY
    }

    fn is_async(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<(), LoadError> {
        let resolved = self.coordinator.factory().resolve(&TargetRef::Primary).await?;
        tracing::info!(
            key = %resolved.target.key,
            backend = %resolved.target.backend_type,
            "Primary storage driver ready"
        );
        Ok(())
    }
}
