//! NAS driver: a network share mounted into the process.
//!
//! Same on-disk layout as the local driver, but the mount can hiccup, so I/O
//! failures other than "not found" and "permission denied" are retried
//! according to the configured `RetryPolicy` before surfacing as
//! `StorageError::Unavailable`.

use crate::fs_tree::{write_atomic, FsTree};
use crate::retry::{RetryError, RetryPolicy};
use crate::traits::{BackendDriver, StoredLocation};
use async_trait::async_trait;
use bytes::Bytes;
use filestow_core::{BackendKind, NasSettings, StorageError, StorageResult};
use std::io;

const TRASH_DIR: &str = ".recycle";

#[derive(Debug, Clone)]
pub struct NasDriver {
    tree: FsTree,
    file_domain: Option<String>,
    retry: RetryPolicy,
}

fn is_transient(e: &io::Error) -> bool {
    !matches!(
        e.kind(),
        io::ErrorKind::NotFound
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::AlreadyExists
    )
}

fn map_retry(operation: &'static str, path: &str, err: RetryError<io::Error>) -> StorageError {
    match err {
        RetryError::Exhausted { attempts, last } => StorageError::Unavailable {
            operation,
            attempts,
            cause: last.to_string(),
        },
        RetryError::Permanent(e) if e.kind() == io::ErrorKind::NotFound => {
            StorageError::NotFound(path.to_string())
        }
        RetryError::Permanent(e) => {
            StorageError::Backend(format!("NAS {} failed for {}: {}", operation, path, e))
        }
    }
}

impl NasDriver {
    /// Attach to an existing mount point. The directory is never created:
    /// a missing mount point means the share is not mounted.
    pub async fn new(settings: &NasSettings, retry: RetryPolicy) -> StorageResult<Self> {
        let tree = FsTree::new(settings.mount_point.clone(), TRASH_DIR);
        tree.probe_writable().await.map_err(|e| {
            StorageError::Backend(format!(
                "NAS mount point {} is not usable: {}",
                settings.mount_point.display(),
                e
            ))
        })?;

        Ok(NasDriver {
            tree,
            file_domain: settings.file_domain.clone(),
            retry,
        })
    }
}

#[async_trait]
impl BackendDriver for NasDriver {
    fn kind(&self) -> BackendKind {
        BackendKind::Nas
    }

    async fn store(&self, relative_path: &str, payload: Bytes) -> StorageResult<StoredLocation> {
        let path = self.tree.live_path(relative_path)?;
        let size = payload.len() as u64;
        let start = std::time::Instant::now();

        self.retry
            .run("store", || write_atomic(&path, &payload), is_transient)
            .await
            .map_err(|e| map_retry("store", relative_path, e))?;

        tracing::info!(
            path = %path.display(),
            key = %relative_path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "NAS store successful"
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
            .retry
            .run("fetch", || self.tree.read(&path), is_transient)
            .await
            .map_err(|e| map_retry("fetch", &location.path, e))?;
        Ok(Bytes::from(data))
    }

    fn fetch_url(&self, location: &StoredLocation) -> String {
        match self.file_domain.as_deref() {
            Some(domain) => format!("{}/{}", domain, location.path),
            None => self.tree.root().join(&location.path).display().to_string(),
        }
    }

    async fn move_to_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = self.tree.live_path(&location.path)?;
        let trash = self.tree.trash_path(&location.trash_relative())?;
        self.retry
            .run("move_to_trash", || self.tree.relocate(&live, &trash), is_transient)
            .await
            .map_err(|e| map_retry("move_to_trash", &location.path, e))?;

        tracing::info!(key = %location.path, "NAS moved to recycle area");
        Ok(())
    }

    async fn copy_to_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = self.tree.live_path(&location.path)?;
        let trash = self.tree.trash_path(&location.trash_relative())?;
        self.retry
            .run("copy_to_trash", || self.tree.duplicate(&live, &trash), is_transient)
            .await
            .map_err(|e| map_retry("copy_to_trash", &location.path, e))?;

        tracing::info!(key = %location.path, "NAS copied to recycle area");
        Ok(())
    }

    async fn restore_from_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = self.tree.live_path(&location.path)?;
        let trash = self.tree.trash_path(&location.trash_relative())?;
        self.retry
            .run("restore_from_trash", || self.tree.relocate(&trash, &live), is_transient)
            .await
            .map_err(|e| map_retry("restore_from_trash", &location.path, e))?;

        tracing::info!(key = %location.path, "NAS restored from recycle area");
        Ok(())
    }

    async fn purge(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = self.tree.live_path(&location.path)?;
        let trash = self.tree.trash_path(&location.trash_relative())?;
        let (tree, live, trash) = (&self.tree, &live, &trash);
        self.retry
            .run(
                "purge",
                || async move {
                    tree.remove_if_exists(live).await?;
                    tree.remove_if_exists(trash).await
                },
                is_transient,
            )
            .await
            .map_err(|e| map_retry("purge", &location.path, e))?;

        tracing::info!(key = %location.path, "NAS purge successful");
        Ok(())
    }

    async fn purge_trashed(&self, location: &StoredLocation) -> StorageResult<()> {
        let trash = self.tree.trash_path(&location.trash_relative())?;
        self.retry
            .run("purge_trashed", || self.tree.remove_if_exists(&trash), is_transient)
            .await
            .map_err(|e| map_retry("purge_trashed", &location.path, e))?;

        tracing::info!(key = %location.path, "NAS recycled copy purged");
        Ok(())
    }

    async fn used_space(&self) -> StorageResult<i64> {
        let root = self.tree.root().display().to_string();
        self.retry
            .run("used_space", || self.tree.used_space(), is_transient)
            .await
            .map_err(|e| map_retry("used_space", &root, e))
    }
}

#[cfg(all(test, feature = "storage-nas"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn driver(mount: &std::path::Path) -> NasDriver {
        NasDriver::new(
            &NasSettings {
                mount_point: mount.to_path_buf(),
                file_domain: None,
            },
            RetryPolicy::immediate(3),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_mount_point_fails_construction() {
        let dir = tempdir().unwrap();
        let result = NasDriver::new(
            &NasSettings {
                mount_point: dir.path().join("not-mounted"),
                file_domain: None,
            },
            RetryPolicy::immediate(1),
        )
        .await;
        assert!(matches!(result, Err(StorageError::Backend(_))));
    }

    #[tokio::test]
    async fn test_store_fetch_and_url() {
        let dir = tempdir().unwrap();
        let driver = driver(dir.path()).await;

        let loc = driver
            .store("2026/05/05/abc.pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert_eq!(&driver.fetch(&loc).await.unwrap()[..], b"%PDF");
        assert_eq!(
            driver.fetch_url(&loc),
            dir.path().join("2026/05/05/abc.pdf").display().to_string()
        );
    }

    #[tokio::test]
    async fn test_recycle_round_trip_and_purge() {
        let dir = tempdir().unwrap();
        let driver = driver(dir.path()).await;
        let loc = driver
            .store("f/g.bin", Bytes::from_static(b"nas bytes"))
            .await
            .unwrap();

        driver.move_to_trash(&loc).await.unwrap();
        assert!(dir.path().join(".recycle/f/g.bin").exists());
        assert!(matches!(
            driver.fetch(&loc).await,
            Err(StorageError::NotFound(_))
        ));

        driver.restore_from_trash(&loc).await.unwrap();
        assert_eq!(driver.used_space().await.unwrap(), 9);

        driver.purge(&loc).await.unwrap();
        driver.purge(&loc).await.unwrap();
        assert_eq!(driver.used_space().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scoped_recycle_copy_survives_sibling_purge() {
        let dir = tempdir().unwrap();
        let driver = driver(dir.path()).await;
        driver
            .store("h/i.bin", Bytes::from_static(b"shared"))
            .await
            .unwrap();
        let older = StoredLocation::at("h/i.bin").in_trash_scope("older");
        let newer = StoredLocation::at("h/i.bin").in_trash_scope("newer");

        driver.copy_to_trash(&older).await.unwrap();
        assert!(dir.path().join(".recycle/older/h/i.bin").exists());
        driver.purge(&newer).await.unwrap();
        assert!(matches!(
            driver.fetch(&newer).await,
            Err(StorageError::NotFound(_))
        ));

        driver.restore_from_trash(&older).await.unwrap();
        assert_eq!(&driver.fetch(&older).await.unwrap()[..], b"shared");
        driver.purge_trashed(&older).await.unwrap();
        assert_eq!(driver.used_space().await.unwrap(), 6);
    }

    #[test]
    fn test_exhausted_retries_map_to_unavailable() {
        let err = map_retry(
            "store",
            "a.bin",
            RetryError::Exhausted {
                attempts: 3,
                last: io::Error::new(io::ErrorKind::TimedOut, "stale handle"),
            },
        );
        assert!(matches!(
            err,
            StorageError::Unavailable { attempts: 3, operation: "store", .. }
        ));
        assert!(is_transient(&io::Error::new(io::ErrorKind::TimedOut, "t")));
        assert!(!is_transient(&io::Error::new(io::ErrorKind::NotFound, "n")));
    }
}
