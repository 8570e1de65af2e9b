use crate::fs_tree::{write_atomic, FsTree};
use crate::traits::{BackendDriver, StoredLocation};
use async_trait::async_trait;
use bytes::Bytes;
use filestow_core::{BackendKind, LocalSettings, StorageError, StorageResult};
use std::io;
use std::path::PathBuf;
use tokio::fs;

const TRASH_DIR: &str = ".trash";
const DEFAULT_URL_PREFIX: &str = "/files";

/// Local filesystem driver. Errors are surfaced immediately as
/// `StorageError::Local`, never retried. Assumes a single process owns the tree.
#[derive(Debug, Clone)]
pub struct LocalDriver {
    tree: FsTree,
    file_domain: Option<String>,
}

impl LocalDriver {
    /// Create a new LocalDriver, creating the upload directory if needed and
    /// probing that it is writable.
    pub async fn new(settings: &LocalSettings) -> StorageResult<Self> {
        let root: PathBuf = settings.upload_path.clone();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Local(io::Error::new(
                e.kind(),
                format!("Failed to create storage directory {}: {}", root.display(), e),
            ))
        })?;

        let tree = FsTree::new(root, TRASH_DIR);
        tree.probe_writable().await.map_err(|e| {
            StorageError::Local(io::Error::new(
                e.kind(),
                format!("Storage directory {} is not writable: {}", tree.root().display(), e),
            ))
        })?;

        Ok(LocalDriver {
            tree,
            file_domain: settings.file_domain.clone(),
        })
    }

    fn not_found_or_local(path: &str, e: io::Error) -> StorageError {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_string())
        } else {
            StorageError::Local(e)
        }
    }
}

#[async_trait]
impl BackendDriver for LocalDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn store(&self, relative_path: &str, payload: Bytes) -> StorageResult<StoredLocation> {
        let path = self.tree.live_path(relative_path)?;
        let size = payload.len() as u64;
        let start = std::time::Instant::now();

        write_atomic(&path, &payload).await?;

        tracing::info!(
            path = %path.display(),
            key = %relative_path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage store successful"
        );

        Ok(StoredLocation {
            path: relative_path.to_string(),
            size_bytes: Some(size),
            trash_scope: None,
        })
    }

    async fn fetch(&self, location: &StoredLocation) -> StorageResult<Bytes> {
        let path = self.tree.live_path(&location.path)?;
        let data = self
            .tree
            .read(&path)
            .await
            .map_err(|e| Self::not_found_or_local(&location.path, e))?;
        Ok(Bytes::from(data))
    }

    fn fetch_url(&self, location: &StoredLocation) -> String {
        let base = self.file_domain.as_deref().unwrap_or(DEFAULT_URL_PREFIX);
        format!("{}/{}", base.trim_end_matches('/'), location.path)
    }

    async fn move_to_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = self.tree.live_path(&location.path)?;
        let trash = self.tree.trash_path(&location.trash_relative())?;
        self.tree
            .relocate(&live, &trash)
            .await
            .map_err(|e| Self::not_found_or_local(&location.path, e))?;

        tracing::info!(key = %location.path, "Local storage moved to trash");
        Ok(())
    }

    async fn copy_to_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = self.tree.live_path(&location.path)?;
        let trash = self.tree.trash_path(&location.trash_relative())?;
        self.tree
            .duplicate(&live, &trash)
            .await
            .map_err(|e| Self::not_found_or_local(&location.path, e))?;

        tracing::info!(key = %location.path, "Local storage copied to trash");
        Ok(())
    }

    async fn restore_from_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = self.tree.live_path(&location.path)?;
        let trash = self.tree.trash_path(&location.trash_relative())?;
        self.tree
            .relocate(&trash, &live)
            .await
            .map_err(|e| Self::not_found_or_local(&location.path, e))?;

        tracing::info!(key = %location.path, "Local storage restored from trash");
        Ok(())
    }

    async fn purge(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = self.tree.live_path(&location.path)?;
        let trash = self.tree.trash_path(&location.trash_relative())?;
        let start = std::time::Instant::now();

        self.tree.remove_if_exists(&live).await?;
        self.tree.remove_if_exists(&trash).await?;

        tracing::info!(
            key = %location.path,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage purge successful"
        );
        Ok(())
    }

    async fn purge_trashed(&self, location: &StoredLocation) -> StorageResult<()> {
        let trash = self.tree.trash_path(&location.trash_relative())?;
        self.tree.remove_if_exists(&trash).await?;

        tracing::info!(key = %location.path, "Local storage trashed copy purged");
        Ok(())
    }

    async fn used_space(&self) -> StorageResult<i64> {
        Ok(self.tree.used_space().await?)
    }
}
