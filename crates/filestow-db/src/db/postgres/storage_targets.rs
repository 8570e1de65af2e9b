//! Storage target repository: the storage_targets table as a configuration source.

use crate::targets::StorageTargetSource;
use async_trait::async_trait;
use filestow_core::{BackendKind, ConfigError, StorageTarget};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use std::collections::BTreeMap;

/// Row type for storage_targets table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct StorageTargetRow {
    pub key: String,
    pub backend_type: BackendKind,
    pub settings: Json<BTreeMap<String, String>>,
    pub is_primary: bool,
    pub trash_enabled: bool,
    pub enabled: bool,
}

impl StorageTargetRow {
    pub fn to_storage_target(self) -> StorageTarget {
        StorageTarget {
            key: self.key,
            backend_type: self.backend_type,
            settings: self.settings.0,
            is_primary: self.is_primary,
            trash_enabled: self.trash_enabled,
            enabled: self.enabled,
        }
    }
}

fn source_error(err: sqlx::Error) -> ConfigError {
    ConfigError::Source(err.to_string())
}

/// Repository for storage_targets table.
#[derive(Clone)]
pub struct PgStorageTargetRepository {
    pool: PgPool,
}

impl PgStorageTargetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageTargetSource for PgStorageTargetRepository {
    #[tracing::instrument(skip(self), fields(db.table = "storage_targets"))]
    async fn list_enabled(&self) -> Result<Vec<StorageTarget>, ConfigError> {
        let rows: Vec<StorageTargetRow> = sqlx::query_as::<Postgres, StorageTargetRow>(
            r#"
            SELECT key, backend_type, settings, is_primary, trash_enabled, enabled
            FROM storage_targets
            WHERE enabled
            ORDER BY key
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(source_error)?;
        Ok(rows
            .into_iter()
            .map(StorageTargetRow::to_storage_target)
            .collect())
    }

    /// Upserts in one transaction. Demotions are written before promotions so
    /// the single-primary index never sees two primaries.
    #[tracing::instrument(skip(self, targets), fields(db.table = "storage_targets", count = targets.len()))]
    async fn save(&self, targets: &[StorageTarget]) -> Result<(), ConfigError> {
        let mut ordered: Vec<&StorageTarget> = targets.iter().collect();
        ordered.sort_by_key(|t| t.is_primary);

        let mut tx = self.pool.begin().await.map_err(source_error)?;
        for target in ordered {
            sqlx::query(
                r#"
                INSERT INTO storage_targets
                    (key, backend_type, settings, is_primary, trash_enabled, enabled)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (key) DO UPDATE SET
                    backend_type = EXCLUDED.backend_type,
                    settings = EXCLUDED.settings,
                    is_primary = EXCLUDED.is_primary,
                    trash_enabled = EXCLUDED.trash_enabled,
                    enabled = EXCLUDED.enabled,
                    updated_at = NOW()
                "#,
            )
            .bind(&target.key)
            .bind(target.backend_type)
            .bind(Json(&target.settings))
            .bind(target.is_primary)
            .bind(target.trash_enabled)
            .bind(target.enabled)
            .execute(&mut *tx)
            .await
            .map_err(source_error)?;
        }
        tx.commit().await.map_err(source_error)?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "storage_targets"))]
    async fn delete(&self, key: &str) -> Result<(), ConfigError> {
        sqlx::query("DELETE FROM storage_targets WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(source_error)?;
        Ok(())
    }
}
