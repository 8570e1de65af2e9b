//! Storage target source contract.

use async_trait::async_trait;
use filestow_core::{ConfigError, StorageTarget};

/// Where storage target configuration is persisted.
#[async_trait]
pub trait StorageTargetSource: Send + Sync {
    /// Every enabled target.
    async fn list_enabled(&self) -> Result<Vec<StorageTarget>, ConfigError>;

    /// Insert or replace `targets` by key, all or nothing. Callers pass a
    /// demoted primary together with its replacement.
    async fn save(&self, targets: &[StorageTarget]) -> Result<(), ConfigError>;

    /// Delete the target with `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), ConfigError>;
}
