//! Data models for the storage engine
//!
//! Storage targets (where files may live), file records (what was stored) and
//! transfer units (an upload in flight).

mod file;
mod settings;
mod target;
mod transfer;

// Re-export all models for convenient imports
pub use file::*;
pub use settings::*;
pub use target::*;
pub use transfer::*;
