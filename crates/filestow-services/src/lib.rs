//! Filestow Services Layer
//!
//! The storage engine proper: the `ConfigRegistry` holding configured storage
//! targets, the `DriverFactory` turning a target key into a live driver, and
//! the `StorageCoordinator` facade that uploads, deduplicates, trashes,
//! restores and purges files on top of them.

pub mod coordinator;
pub mod factory;
pub mod registry;

pub use coordinator::StorageCoordinator;
pub use factory::{DriverCache, DriverFactory, ResolvedDriver};
pub use registry::ConfigRegistry;

pub use filestow_core::{
    BackendKind, ConfigError, DriverError, FileRecord, FileState, FileTransferUnit, StorageError,
    StorageResult, StorageTarget, TargetRef,
};
pub use filestow_db::{FileRecordStore, StorageTargetSource};
pub use filestow_processing::DerivativeOptions;
pub use filestow_storage::{BackendDriver, DriverOptions, RetryPolicy};
