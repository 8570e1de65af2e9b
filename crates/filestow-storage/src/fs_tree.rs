//! Filesystem primitives shared by the local and NAS drivers.
//!
//! All methods return raw `io::Error`s so each driver can decide whether a
//! failure is retried (NAS) or surfaced immediately (local).

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::keys;
use filestow_core::StorageResult;

const PROBE_FILE: &str = ".filestow-probe";

/// A directory tree with a live area and a trash area under one root.
#[derive(Debug, Clone)]
pub(crate) struct FsTree {
    root: PathBuf,
    trash_dir: &'static str,
}

/// Removes a temp file on drop unless the write was committed, so a failed or
/// cancelled write never leaves a partial artifact.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to remove temporary file"
                    );
                }
            }
        }
    }
}

impl FsTree {
    pub(crate) fn new(root: impl Into<PathBuf>, trash_dir: &'static str) -> Self {
        Self {
            root: root.into(),
            trash_dir,
        }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Live path for a validated relative path.
    pub(crate) fn live_path(&self, relative: &str) -> StorageResult<PathBuf> {
        keys::validate_path(relative)?;
        Ok(self.root.join(relative))
    }

    /// Trash path for a validated relative path.
    pub(crate) fn trash_path(&self, relative: &str) -> StorageResult<PathBuf> {
        keys::validate_path(relative)?;
        Ok(self.root.join(self.trash_dir).join(relative))
    }

    /// Check that the root exists and accepts writes.
    pub(crate) async fn probe_writable(&self) -> io::Result<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", self.root.display()),
            ));
        }
        let probe = self.root.join(PROBE_FILE);
        write_atomic(&probe, b"ok").await?;
        fs::remove_file(&probe).await
    }

    pub(crate) async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path).await
    }

    /// Move `from` to `to`, creating parent directories. Succeeds without
    /// touching anything when `from` is gone but `to` already exists, so a
    /// repeated move is harmless.
    pub(crate) async fn relocate(&self, from: &Path, to: &Path) -> io::Result<()> {
        if !fs::try_exists(from).await? {
            if fs::try_exists(to).await? {
                return Ok(());
            }
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", from.display()),
            ));
        }
        ensure_parent_dir(to).await?;
        fs::rename(from, to).await
    }

    /// Copy `from` to `to` through a temp file, creating parent directories.
    pub(crate) async fn duplicate(&self, from: &Path, to: &Path) -> io::Result<()> {
        let data = fs::read(from).await?;
        write_atomic(to, &data).await
    }

    /// Remove a file, treating a missing file as success.
    pub(crate) async fn remove_if_exists(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Total size of regular files under the root, trash included.
    pub(crate) async fn used_space(&self) -> io::Result<i64> {
        let mut total: i64 = 0;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = fs::symlink_metadata(entry.path()).await?;
                if meta.is_dir() {
                    pending.push(entry.path());
                } else if meta.is_file() {
                    total = total.saturating_add(meta.len() as i64);
                }
            }
        }
        Ok(total)
    }
}

pub(crate) async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Write `data` to a sibling temp file, fsync it, then rename it over `target`.
pub(crate) async fn write_atomic(target: &Path, data: &[u8]) -> io::Result<()> {
    ensure_parent_dir(target).await?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = target.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));
    let mut guard = TempFileGuard::new(tmp.clone());

    let mut file = fs::File::create(&tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, target).await?;
    guard.disarm();
    Ok(())
}
