//! Repositories for file records and storage targets
//
// Contracts
pub mod records;
pub mod targets;
//
// Implementations
pub mod json_file;
pub mod memory;
pub mod postgres;
//
// Pool and migrations
pub mod setup;

pub use json_file::JsonFileTargetSource;
pub use memory::{InMemoryFileRecordStore, InMemoryTargetSource};
pub use postgres::{PgFileRecordRepository, PgStorageTargetRepository};
pub use records::FileRecordStore;
pub use setup::setup_database;
pub use targets::StorageTargetSource;
