//! Filestow Storage Library
//!
//! This crate provides the `BackendDriver` contract and its implementations:
//! local filesystem, NAS mount, and two object-store flavours (S3-compatible
//! with path-style URLs, vendor cloud with virtual-hosted URLs).
//!
//! # Path layout
//!
//! Every backend stores payloads under the same relative layout, derived in
//! the `keys` module: `YYYY/MM/DD/{md5}.{ext}` for originals and
//! `YYYY/MM/DD/{md5}_thumb.{ext}` for image derivatives. Paths must not
//! contain `..`, backslashes or a leading `/`. Trashed artifacts keep their
//! relative path inside a backend-specific trash namespace.

pub mod factory;
mod fs_tree;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-nas")]
pub mod nas;
#[cfg(feature = "storage-object")]
pub mod object;
pub mod retry;
pub mod traits;

// Re-export commonly used types
pub use factory::{constructor_for, create_driver, DriverConstructor, DriverOptions};
pub use filestow_core::{BackendKind, StorageError, StorageResult};
#[cfg(feature = "storage-local")]
pub use local::LocalDriver;
#[cfg(feature = "storage-nas")]
pub use nas::NasDriver;
#[cfg(feature = "storage-object")]
pub use object::{ObjectStoreDriver, UrlStyle};
pub use retry::{RetryError, RetryPolicy};
pub use traits::{BackendDriver, StoredLocation};
