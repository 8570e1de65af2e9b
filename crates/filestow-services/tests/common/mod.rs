//! Shared fixtures for storage engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use filestow_core::settings_keys as keys;
use filestow_core::{FileRecord, FileRecordPatch, RecordStoreError};
use filestow_db::{InMemoryFileRecordStore, InMemoryTargetSource};
use filestow_services::{
    BackendKind, DerivativeOptions, DriverOptions, FileRecordStore, RetryPolicy,
    StorageCoordinator, StorageTarget,
};
use object_store::memory::InMemory;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Record store that can be told to reject inserts.
#[derive(Default)]
pub struct FlakyRecordStore {
    inner: InMemoryFileRecordStore,
    reject_creates: AtomicBool,
}

impl FlakyRecordStore {
    pub fn reject_creates(&self, reject: bool) {
        self.reject_creates.store(reject, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<FileRecord> {
        self.inner.all().await
    }
}

#[async_trait]
impl FileRecordStore for FlakyRecordStore {
    async fn create(&self, record: &FileRecord) -> Result<Uuid, RecordStoreError> {
        if self.reject_creates.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Backend("database is read-only".into()));
        }
        self.inner.create(record).await
    }

    async fn find_by_checksum(
        &self,
        storage_key: &str,
        checksum: &str,
    ) -> Result<Option<FileRecord>, RecordStoreError> {
        self.inner.find_by_checksum(storage_key, checksum).await
    }

    async fn list_by_checksum(
        &self,
        storage_key: &str,
        checksum: &str,
    ) -> Result<Vec<FileRecord>, RecordStoreError> {
        self.inner.list_by_checksum(storage_key, checksum).await
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &FileRecordPatch,
    ) -> Result<FileRecord, RecordStoreError> {
        self.inner.update(id, patch).await
    }

    async fn count_active_by_storage_key(
        &self,
        storage_key: &str,
    ) -> Result<i64, RecordStoreError> {
        self.inner.count_active_by_storage_key(storage_key).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, RecordStoreError> {
        self.inner.find_by_id(id).await
    }
}

pub struct TestEngine {
    pub coordinator: StorageCoordinator,
    pub records: Arc<FlakyRecordStore>,
    pub source: Arc<InMemoryTargetSource>,
    pub dir: TempDir,
}

impl TestEngine {
    /// Upload root of the local primary target.
    pub fn disk_root(&self) -> PathBuf {
        self.dir.path().join("disk")
    }

    pub fn file_exists(&self, relative: &str) -> bool {
        self.disk_root().join(relative).exists()
    }

    /// Whether `owner` has a trashed copy of `relative`.
    pub fn trashed_exists(&self, owner: Uuid, relative: &str) -> bool {
        self.disk_root()
            .join(".trash")
            .join(owner.to_string())
            .join(relative)
            .exists()
    }
}

pub fn local_target(key: &str, root: &Path) -> StorageTarget {
    StorageTarget::new(key, BackendKind::Local)
        .with_setting(keys::UPLOAD_PATH, root.display().to_string())
}

/// Local primary `disk`, local `archive` (real delete), and object store `cloud`
/// backed by an in-memory store.
pub async fn engine() -> TestEngine {
    let engine = unloaded_engine().await;
    engine.coordinator.reload_config().await.unwrap();
    engine
}

pub async fn unloaded_engine() -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(InMemoryTargetSource::with_targets([
        local_target("disk", &dir.path().join("disk")).primary(),
        local_target("archive", &dir.path().join("archive")).with_setting(keys::REAL_DELETE, "true"),
        StorageTarget::new("cloud", BackendKind::ObjectStoreB)
            .with_setting(keys::ENDPOINT, "https://oss.example.com")
            .with_setting(keys::ACCESS_KEY, "AK")
            .with_setting(keys::SECRET_KEY, "SK")
            .with_setting(keys::BUCKET, "media"),
    ]));
    let records = Arc::new(FlakyRecordStore::default());
    let drivers = DriverOptions::new(RetryPolicy::immediate(2))
        .with_object_store("cloud", Arc::new(InMemory::new()));

    let coordinator = StorageCoordinator::assemble(
        source.clone(),
        records.clone(),
        drivers,
        DerivativeOptions {
            max_dimension: 64,
            jpeg_quality: 70,
        },
    );

    TestEngine {
        coordinator,
        records,
        source,
        dir,
    }
}

/// Encoded PNG of a solid colour.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut buffer = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    buffer
}
