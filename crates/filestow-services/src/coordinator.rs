//! Storage coordinator: the single entry point for file operations.
//!
//! Uploads are checksummed once, deduplicated per target, written under a
//! date/checksum path, optionally accompanied by an image derivative, and
//! only then recorded. A record that cannot be written rolls back the bytes
//! it would have described. Deletes and restores always act on the record as
//! currently stored, never on the caller's copy.

use crate::factory::{DriverFactory, ResolvedDriver};
use crate::registry::ConfigRegistry;
use bytes::Bytes;
use chrono::Utc;
use filestow_core::{
    md5_hex, ConfigError, FileRecord, FileRecordPatch, FileState, FileTransferUnit,
    RecordStoreError, StorageError, StorageResult, StorageTarget, TargetRef,
};
use filestow_db::{FileRecordStore, StorageTargetSource};
use filestow_processing::{Derivative, DerivativeError, DerivativeOptions};
use filestow_storage::{keys, BackendDriver, DriverOptions, StoredLocation};
use std::sync::Arc;
use uuid::Uuid;

pub struct StorageCoordinator {
    registry: Arc<ConfigRegistry>,
    factory: Arc<DriverFactory>,
    records: Arc<dyn FileRecordStore>,
    derivatives: DerivativeOptions,
}

impl StorageCoordinator {
    pub fn new(
        registry: Arc<ConfigRegistry>,
        factory: Arc<DriverFactory>,
        records: Arc<dyn FileRecordStore>,
        derivatives: DerivativeOptions,
    ) -> Self {
        Self {
            registry,
            factory,
            records,
            derivatives,
        }
    }

    /// Wire a registry, factory and coordinator over the given collaborators.
    /// The registry still has to be loaded before uploads are accepted.
    pub fn assemble(
        source: Arc<dyn StorageTargetSource>,
        records: Arc<dyn FileRecordStore>,
        drivers: DriverOptions,
        derivatives: DerivativeOptions,
    ) -> Self {
        let registry = Arc::new(ConfigRegistry::new(source, records.clone()));
        let factory = Arc::new(DriverFactory::new(registry.clone(), drivers));
        Self::new(registry, factory, records, derivatives)
    }

    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    pub fn factory(&self) -> &Arc<DriverFactory> {
        &self.factory
    }

    /// Store `unit` on `target` and return its record. Identical bytes already
    /// live on the same target return the existing record unchanged.
    pub async fn upload(
        &self,
        unit: FileTransferUnit,
        target: impl Into<TargetRef>,
    ) -> StorageResult<FileRecord> {
        if !self.registry.is_loaded().await {
            return Err(StorageError::NotReady);
        }

        let start = std::time::Instant::now();
        let checksum = md5_hex(&unit.payload);
        if let Some(declared) = unit.checksum.as_deref() {
            if !declared.trim().eq_ignore_ascii_case(&checksum) {
                return Err(StorageError::ChecksumMismatch {
                    declared: declared.to_string(),
                    computed: checksum,
                });
            }
        }

        let resolved = self.factory.resolve(&target.into()).await?;
        let key = resolved.target.key.clone();

        if let Some(existing) = self.records.find_by_checksum(&key, &checksum).await? {
            tracing::info!(
                key = %key,
                checksum = %checksum,
                record_id = %existing.id,
                "Upload deduplicated against existing record"
            );
            return Ok(existing);
        }

        let driver = &resolved.driver;
        let id = Uuid::new_v4();
        let primary_path = keys::derive_path(
            Utc::now().date_naive(),
            &checksum,
            unit.extension().as_deref(),
        );
        let size_bytes = unit.payload.len() as i64;
        driver.store(&primary_path, unit.payload.clone()).await?;
        let mut written = vec![primary_path.clone()];

        let derivative_path = if unit.is_image() {
            match self
                .store_derivative(driver.as_ref(), &primary_path, unit.payload.clone())
                .await
            {
                Ok(path) => path,
                Err(e) => {
                    return Err(self
                        .roll_back(driver.as_ref(), &key, &checksum, id, &written, e)
                        .await)
                }
            }
        } else {
            None
        };
        written.extend(derivative_path.clone());

        let record = FileRecord {
            id,
            storage_key: key.clone(),
            original_name: unit.file_name,
            content_type: unit.declared_type,
            size_bytes,
            checksum,
            primary_path,
            derivative_path,
            in_trash: false,
            created_at: Utc::now(),
            deleted_at: None,
            purged_at: None,
        };

        match self.records.create(&record).await {
            Ok(id) => {
                tracing::info!(
                    key = %key,
                    record_id = %id,
                    path = %record.primary_path,
                    size_bytes = record.size_bytes,
                    derivative = record.derivative_path.is_some(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Upload stored"
                );
                Ok(FileRecord { id, ..record })
            }
            Err(RecordStoreError::Conflict(reason)) => {
                // The winner's record owns these paths.
                match self.records.find_by_checksum(&key, &record.checksum).await? {
                    Some(winner) => {
                        tracing::info!(
                            key = %key,
                            record_id = %winner.id,
                            "Concurrent identical upload resolved to existing record"
                        );
                        Ok(winner)
                    }
                    None => {
                        let cause = StorageError::Record(RecordStoreError::Conflict(reason));
                        Err(self
                            .roll_back(driver.as_ref(), &key, &record.checksum, id, &written, cause)
                            .await)
                    }
                }
            }
            Err(e) => Err(self
                .roll_back(driver.as_ref(), &key, &record.checksum, id, &written, e.into())
                .await),
        }
    }

    /// Undo the writes of a failed upload. Bytes that an active record on the
    /// same target also points at stay in place.
    async fn roll_back(
        &self,
        driver: &dyn BackendDriver,
        key: &str,
        checksum: &str,
        id: Uuid,
        written: &[String],
        cause: StorageError,
    ) -> StorageError {
        let Some(primary_path) = written.first() else {
            return cause;
        };
        match self.records.list_by_checksum(key, checksum).await {
            Ok(owners) if owners.iter().any(|o| &o.primary_path == primary_path) => {
                tracing::info!(
                    key = %key,
                    path = %primary_path,
                    error = %cause,
                    "Failed upload wrote bytes another record owns, leaving them in place"
                );
                cause
            }
            Ok(_) => {
                let locations: Vec<StoredLocation> = written
                    .iter()
                    .map(|path| scoped_location(id, path))
                    .collect();
                compensate(driver, &locations, cause).await
            }
            Err(lookup) => {
                tracing::warn!(
                    key = %key,
                    path = %primary_path,
                    error = %cause,
                    lookup_error = %lookup,
                    "Could not check for other owners, leaving failed upload bytes in place"
                );
                cause
            }
        }
    }

    /// Build and store the derivative next to `primary_path`. Payloads that do
    /// not decode as images get no derivative.
    async fn store_derivative(
        &self,
        driver: &dyn BackendDriver,
        primary_path: &str,
        payload: Bytes,
    ) -> StorageResult<Option<String>> {
        let derivative = match Derivative::generate_blocking(payload, self.derivatives).await {
            Ok(derivative) => derivative,
            Err(e @ DerivativeError::Decode(_)) => {
                tracing::warn!(
                    path = %primary_path,
                    error = %e,
                    "Declared image could not be decoded, storing without derivative"
                );
                return Ok(None);
            }
            Err(e) => return Err(StorageError::Backend(e.to_string())),
        };

        let path = keys::derivative_path(primary_path, derivative.format.extension());
        driver.store(&path, derivative.bytes).await?;
        Ok(Some(path))
    }

    async fn current(&self, id: Uuid) -> StorageResult<FileRecord> {
        self.records
            .find_by_id(id)
            .await?
            .ok_or(StorageError::Record(RecordStoreError::NotFound(id)))
    }

    async fn driver_for(&self, record: &FileRecord) -> StorageResult<ResolvedDriver> {
        Ok(self
            .factory
            .resolve(&TargetRef::Key(record.storage_key.clone()))
            .await?)
    }

    /// Whether another active record points at the same bytes.
    async fn shares_bytes(&self, record: &FileRecord) -> StorageResult<bool> {
        Ok(self
            .records
            .list_by_checksum(&record.storage_key, &record.checksum)
            .await?
            .iter()
            .any(|other| other.id != record.id && other.primary_path == record.primary_path))
    }

    /// Look up a record by id.
    pub async fn record(&self, id: Uuid) -> StorageResult<FileRecord> {
        self.current(id).await
    }

    /// Public reference to the record's primary artifact.
    pub async fn resolve_url(&self, record: &FileRecord) -> StorageResult<String> {
        let current = self.current(record.id).await?;
        match current.state() {
            FileState::Purged => return Err(StorageError::Purged(current.id)),
            FileState::Trashed => return Err(StorageError::NotFound(current.primary_path)),
            FileState::Active => {}
        }
        let resolved = self.driver_for(&current).await?;
        Ok(resolved
            .driver
            .fetch_url(&StoredLocation::at(&current.primary_path)))
    }

    /// Bytes of the record's primary artifact.
    pub async fn fetch(&self, record: &FileRecord) -> StorageResult<Bytes> {
        let current = self.current(record.id).await?;
        match current.state() {
            FileState::Purged => return Err(StorageError::Purged(current.id)),
            FileState::Trashed => return Err(StorageError::NotFound(current.primary_path)),
            FileState::Active => {}
        }
        let resolved = self.driver_for(&current).await?;
        resolved
            .driver
            .fetch(&StoredLocation::at(&current.primary_path))
            .await
    }

    /// Trash the record, or purge it when `permanent` is set or the target
    /// keeps no trash. The record is updated only after the backend succeeds.
    pub async fn delete(&self, record: &FileRecord, permanent: bool) -> StorageResult<FileRecord> {
        let current = self.current(record.id).await?;
        if current.state() == FileState::Purged {
            return Err(StorageError::Purged(current.id));
        }
        let resolved = self.driver_for(&current).await?;

        if permanent || !resolved.target.uses_trash() {
            return self.purge(current, &resolved).await;
        }
        if current.state() == FileState::Trashed {
            return Ok(current);
        }

        let driver = resolved.driver.as_ref();
        let primary = scoped_location(current.id, &current.primary_path);
        if self.shares_bytes(&current).await? {
            tracing::info!(
                record_id = %current.id,
                path = %current.primary_path,
                "Bytes shared with another record, trashing a copy"
            );
            driver.copy_to_trash(&primary).await?;
            if let Some(path) = current.derivative_path.as_deref() {
                tolerate_missing(driver.copy_to_trash(&scoped_location(current.id, path)).await)?;
            }
        } else {
            driver.move_to_trash(&primary).await?;
            if let Some(path) = current.derivative_path.as_deref() {
                tolerate_missing(driver.move_to_trash(&scoped_location(current.id, path)).await)?;
            }
        }

        let updated = self
            .records
            .update(current.id, &FileRecordPatch::trashed(Utc::now()))
            .await?;
        tracing::info!(
            key = %updated.storage_key,
            record_id = %updated.id,
            "File moved to trash"
        );
        Ok(updated)
    }

    async fn purge(
        &self,
        current: FileRecord,
        resolved: &ResolvedDriver,
    ) -> StorageResult<FileRecord> {
        let driver = resolved.driver.as_ref();
        if current.state() == FileState::Trashed {
            // The live path may belong to a newer record by now.
            for path in current.paths() {
                driver.purge_trashed(&scoped_location(current.id, path)).await?;
            }
        } else if self.shares_bytes(&current).await? {
            tracing::info!(
                record_id = %current.id,
                path = %current.primary_path,
                "Bytes shared with another record, purging record only"
            );
        } else {
            for path in current.paths() {
                driver.purge(&scoped_location(current.id, path)).await?;
            }
        }

        let updated = self
            .records
            .update(current.id, &FileRecordPatch::purged(Utc::now()))
            .await?;
        tracing::info!(
            key = %updated.storage_key,
            record_id = %updated.id,
            "File purged"
        );
        Ok(updated)
    }

    /// Bring a trashed record back.
    pub async fn restore(&self, record: &FileRecord) -> StorageResult<FileRecord> {
        let current = self.current(record.id).await?;
        match current.state() {
            FileState::Purged => return Err(StorageError::Purged(current.id)),
            FileState::Active => return Err(StorageError::NotInTrash(current.id)),
            FileState::Trashed => {}
        }

        let resolved = self.driver_for(&current).await?;
        let driver = resolved.driver.as_ref();
        driver
            .restore_from_trash(&scoped_location(current.id, &current.primary_path))
            .await?;
        if let Some(path) = current.derivative_path.as_deref() {
            tolerate_missing(
                driver
                    .restore_from_trash(&scoped_location(current.id, path))
                    .await,
            )?;
        }

        let updated = self
            .records
            .update(current.id, &FileRecordPatch::restored())
            .await?;
        tracing::info!(
            key = %updated.storage_key,
            record_id = %updated.id,
            "File restored from trash"
        );
        Ok(updated)
    }

    /// Bytes occupied on the target's medium.
    pub async fn usage(&self, target: impl Into<TargetRef>) -> StorageResult<i64> {
        let resolved = self.factory.resolve(&target.into()).await?;
        resolved.driver.used_space().await
    }

    pub async fn list_storage_targets(&self) -> Vec<StorageTarget> {
        self.registry.list().await
    }

    pub async fn upsert_storage_target(&self, target: StorageTarget) -> Result<(), ConfigError> {
        self.registry.upsert(target).await
    }

    pub async fn remove_storage_target(&self, key: &str) -> Result<(), ConfigError> {
        self.registry.remove(key).await
    }

    pub async fn reload_config(&self) -> Result<(), ConfigError> {
        self.registry.load().await
    }
}

/// Location of one of `owner`'s artifacts. Each record trashes into its own
/// scope, so records that share a live path never share a trash copy.
fn scoped_location(owner: Uuid, path: &str) -> StoredLocation {
    StoredLocation::at(path).in_trash_scope(owner.to_string())
}

/// Derivatives are optional, so a missing one is not an error.
fn tolerate_missing(result: StorageResult<()>) -> StorageResult<()> {
    match result {
        Err(StorageError::NotFound(path)) => {
            tracing::warn!(path = %path, "Derivative missing, skipped");
            Ok(())
        }
        other => other,
    }
}

/// Purge `locations` after `cause`. Returns `cause` when the rollback succeeds,
/// otherwise both errors.
async fn compensate(
    driver: &dyn BackendDriver,
    locations: &[StoredLocation],
    cause: StorageError,
) -> StorageError {
    for location in locations {
        if let Err(compensation) = driver.purge(location).await {
            tracing::error!(
                path = %location.path,
                error = %cause,
                compensation_error = %compensation,
                "Failed to roll back stored artifact, it is now orphaned"
            );
            return StorageError::CompensationFailed {
                cause: Box::new(cause),
                compensation: Box::new(compensation),
            };
        }
    }
    tracing::warn!(error = %cause, count = locations.len(), "Upload rolled back");
    cause
}
