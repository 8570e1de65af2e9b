//! Filestow Core Library
//!
//! This crate provides the domain models, error taxonomy and configuration
//! shared by every filestow component: storage targets, file records,
//! transfer units and the errors raised while moving bytes between them.

pub mod checksum;
pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use checksum::md5_hex;
pub use config::{Config, RetryConfig};
pub use error::{ConfigError, DriverError, LoadError, RecordStoreError, StorageError, StorageResult};
pub use models::keys as settings_keys;
pub use models::{
    BackendSettings, FileRecord, FileRecordPatch, FileState, FileTransferUnit, LocalSettings,
    NasSettings, ObjectStoreSettings, StorageTarget, TargetRef,
};
pub use storage_types::BackendKind;
