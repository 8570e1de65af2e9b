//! Storage targets persisted as a JSON array on disk.
//!
//! The file holds every target, enabled or not, in the same camelCase shape
//! the admin CLI prints. Writes go to a sibling temp file that is renamed
//! over the original.

use crate::targets::StorageTargetSource;
use async_trait::async_trait;
use filestow_core::{ConfigError, StorageTarget};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct JsonFileTargetSource {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileTargetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every target in the file. A missing file reads as empty.
    async fn read_all(&self) -> Result<BTreeMap<String, StorageTarget>, ConfigError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.source_error("read", e)),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }

        let targets: Vec<StorageTarget> = serde_json::from_slice(&data).map_err(|e| {
            ConfigError::Source(format!("Invalid targets file {}: {}", self.path.display(), e))
        })?;
        Ok(targets.into_iter().map(|t| (t.key.clone(), t)).collect())
    }

    async fn write_all(&self, targets: &BTreeMap<String, StorageTarget>) -> Result<(), ConfigError> {
        let list: Vec<&StorageTarget> = targets.values().collect();
        let data = serde_json::to_vec_pretty(&list)
            .map_err(|e| ConfigError::Source(format!("Failed to encode targets: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.source_error("create directory for", e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| self.source_error("write", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.source_error("replace", e))?;

        tracing::debug!(
            path = %self.path.display(),
            count = list.len(),
            "Storage targets file written"
        );
        Ok(())
    }

    fn source_error(&self, action: &str, e: io::Error) -> ConfigError {
        ConfigError::Source(format!(
            "Failed to {} targets file {}: {}",
            action,
            self.path.display(),
            e
        ))
    }
}

#[async_trait]
impl StorageTargetSource for JsonFileTargetSource {
    async fn list_enabled(&self) -> Result<Vec<StorageTarget>, ConfigError> {
        Ok(self
            .read_all()
            .await?
            .into_values()
            .filter(|t| t.enabled)
            .collect())
    }

    async fn save(&self, targets: &[StorageTarget]) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        for target in targets {
            all.insert(target.key.clone(), target.clone());
        }
        self.write_all(&all).await
    }

    async fn delete(&self, key: &str) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        if all.remove(key).is_some() {
            self.write_all(&all).await?;
        }
        Ok(())
    }
}
