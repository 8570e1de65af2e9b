//! Filestow persistence layer
//!
//! File record stores and storage target sources: Postgres repositories built
//! on `sqlx`, a JSON file source for database-less deployments, and in-memory
//! implementations for tests and embedding.

pub mod db;

pub use db::*;
