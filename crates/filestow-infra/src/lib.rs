//! Filestow infrastructure library
//!
//! Process-level plumbing shared by the binaries:
//! - Telemetry initialization (tracing subscriber)
//! - Ordered startup loaders with a per-loader outcome

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "startup")]
pub mod startup;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};

#[cfg(feature = "startup")]
pub use startup::{
    DriverWarmupLoader, LoaderOutcome, LoaderStatus, StartupLoader, StartupReport,
    StartupSequence, StorageConfigLoader,
};
