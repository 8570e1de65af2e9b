//! Postgres repositories (`file_records`, `storage_targets`).

mod file_records;
mod storage_targets;

pub use file_records::{FileRecordRow, PgFileRecordRepository};
pub use storage_targets::{PgStorageTargetRepository, StorageTargetRow};
