//! Engine wiring for the CLI.

use anyhow::{Context, Result};
use filestow_core::Config;
use filestow_db::{
    setup_database, FileRecordStore, InMemoryFileRecordStore, InMemoryTargetSource,
    JsonFileTargetSource, PgFileRecordRepository, PgStorageTargetRepository, StorageTargetSource,
};
use filestow_infra::{DriverWarmupLoader, StartupReport, StartupSequence, StorageConfigLoader};
use filestow_services::{DerivativeOptions, DriverOptions, RetryPolicy, StorageCoordinator};
use std::sync::Arc;

pub struct Backends {
    pub source: Arc<dyn StorageTargetSource>,
    pub records: Arc<dyn FileRecordStore>,
}

/// Pick the configuration source and record store from `config`.
pub async fn setup_backends(config: &Config) -> Result<Backends> {
    if config.database_url.is_some() {
        let pool = setup_database(config)
            .await
            .context("Database setup failed")?;
        return Ok(Backends {
            source: Arc::new(PgStorageTargetRepository::new(pool.clone())),
            records: Arc::new(PgFileRecordRepository::new(pool)),
        });
    }

    let source: Arc<dyn StorageTargetSource> = match &config.targets_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using storage targets file");
            Arc::new(JsonFileTargetSource::new(path.clone()))
        }
        None => {
            tracing::warn!("Neither DATABASE_URL nor FILESTOW_TARGETS_FILE is set, storage targets will not persist");
            Arc::new(InMemoryTargetSource::new())
        }
    };
    tracing::warn!("No database configured, file records are kept in memory");

    Ok(Backends {
        source,
        records: Arc::new(InMemoryFileRecordStore::new()),
    })
}

/// Build the coordinator and run the startup loaders.
pub async fn initialize(config: &Config) -> Result<(Arc<StorageCoordinator>, StartupReport)> {
    let backends = setup_backends(config).await?;

    let coordinator = Arc::new(StorageCoordinator::assemble(
        backends.source,
        backends.records,
        DriverOptions::new(RetryPolicy::from(&config.retry)),
        DerivativeOptions::from(config),
    ));

    let report = StartupSequence::new()
        .with_loader(Arc::new(StorageConfigLoader::new(
            coordinator.registry().clone(),
        )))
        .with_loader(Arc::new(DriverWarmupLoader::new(coordinator.clone())))
        .run()
        .await;

    Ok((coordinator, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestow_core::settings_keys as keys;
    use filestow_services::{BackendKind, StorageTarget};

    #[tokio::test]
    async fn targets_file_drives_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let target = StorageTarget::new("disk", BackendKind::Local)
            .with_setting(keys::UPLOAD_PATH, dir.path().join("files").display().to_string())
            .primary();
        std::fs::write(&path, serde_json::to_vec(&[target]).unwrap()).unwrap();

        let config = Config {
            targets_file: Some(path),
            ..Config::default()
        };
        let (coordinator, report) = initialize(&config).await.unwrap();
        assert!(report.ready);
        assert_eq!(coordinator.list_storage_targets().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_configuration_is_not_ready() {
        let config = Config::default();
        let (coordinator, report) = initialize(&config).await.unwrap();
        assert!(!report.ready);
        assert!(!coordinator.registry().is_loaded().await);
    }
}
