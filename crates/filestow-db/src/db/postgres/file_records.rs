//! File record repository: CRUD for the file_records table.

use crate::records::FileRecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filestow_core::{FileRecord, FileRecordPatch, RecordStoreError};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const COLUMNS: &str = "id, storage_key, original_name, content_type, size_bytes, checksum, \
     primary_path, derivative_path, in_trash, created_at, deleted_at, purged_at";

/// Row type for file_records table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct FileRecordRow {
    pub id: Uuid,
    pub storage_key: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub primary_path: String,
    pub derivative_path: Option<String>,
    pub in_trash: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub purged_at: Option<DateTime<Utc>>,
}

impl FileRecordRow {
    pub fn to_file_record(self) -> FileRecord {
        FileRecord {
            id: self.id,
            storage_key: self.storage_key,
            original_name: self.original_name,
            content_type: self.content_type,
            size_bytes: self.size_bytes,
            checksum: self.checksum,
            primary_path: self.primary_path,
            derivative_path: self.derivative_path,
            in_trash: self.in_trash,
            created_at: self.created_at,
            deleted_at: self.deleted_at,
            purged_at: self.purged_at,
        }
    }
}

/// Repository for file_records table.
#[derive(Clone)]
pub struct PgFileRecordRepository {
    pool: PgPool,
}

impl PgFileRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRecordStore for PgFileRecordRepository {
    #[tracing::instrument(skip(self, record), fields(db.table = "file_records", db.record_id = %record.id))]
    async fn create(&self, record: &FileRecord) -> Result<Uuid, RecordStoreError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO file_records (
                id, storage_key, original_name, content_type, size_bytes, checksum,
                primary_path, derivative_path, in_trash, created_at, deleted_at, purged_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(record.id)
        .bind(&record.storage_key)
        .bind(&record.original_name)
        .bind(&record.content_type)
        .bind(record.size_bytes)
        .bind(&record.checksum)
        .bind(&record.primary_path)
        .bind(&record.derivative_path)
        .bind(record.in_trash)
        .bind(record.created_at)
        .bind(record.deleted_at)
        .bind(record.purged_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_records"))]
    async fn find_by_checksum(
        &self,
        storage_key: &str,
        checksum: &str,
    ) -> Result<Option<FileRecord>, RecordStoreError> {
        let row: Option<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM file_records
            WHERE storage_key = $1 AND checksum = $2
              AND NOT in_trash AND purged_at IS NULL
            ORDER BY created_at ASC
            LIMIT 1
            "#
        ))
        .bind(storage_key)
        .bind(checksum)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FileRecordRow::to_file_record))
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_records"))]
    async fn list_by_checksum(
        &self,
        storage_key: &str,
        checksum: &str,
    ) -> Result<Vec<FileRecord>, RecordStoreError> {
        let rows: Vec<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM file_records
            WHERE storage_key = $1 AND checksum = $2
              AND NOT in_trash AND purged_at IS NULL
            ORDER BY created_at ASC
            "#
        ))
        .bind(storage_key)
        .bind(checksum)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FileRecordRow::to_file_record).collect())
    }

    #[tracing::instrument(skip(self, patch), fields(db.table = "file_records", db.record_id = %id))]
    async fn update(
        &self,
        id: Uuid,
        patch: &FileRecordPatch,
    ) -> Result<FileRecord, RecordStoreError> {
        let row: Option<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&format!(
            r#"
            UPDATE file_records SET
                in_trash = COALESCE($2, in_trash),
                deleted_at = CASE WHEN $3 THEN $4 ELSE deleted_at END,
                purged_at = COALESCE($5, purged_at)
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.in_trash)
        .bind(patch.deleted_at.is_some())
        .bind(patch.deleted_at.flatten())
        .bind(patch.purged_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecordRow::to_file_record)
            .ok_or(RecordStoreError::NotFound(id))
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_records"))]
    async fn count_active_by_storage_key(
        &self,
        storage_key: &str,
    ) -> Result<i64, RecordStoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM file_records WHERE storage_key = $1 AND purged_at IS NULL",
        )
        .bind(storage_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_records", db.record_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<FileRecord>, RecordStoreError> {
        let row: Option<FileRecordRow> = sqlx::query_as::<Postgres, FileRecordRow>(&format!(
            "SELECT {COLUMNS} FROM file_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(FileRecordRow::to_file_record))
    }
}
