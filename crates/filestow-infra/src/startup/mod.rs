//! Ordered startup loaders.
//!
//! Loaders run once, lowest priority first. A synchronous loader is awaited
//! before the next one starts; an async loader is spawned and the sequence
//! moves on. The process is ready for upload traffic only when every
//! synchronous critical loader succeeded.

mod storage;

pub use storage::{DriverWarmupLoader, StorageConfigLoader};

use async_trait::async_trait;
use filestow_core::LoadError;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

#[async_trait]
pub trait StartupLoader: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> i32;

    /// A failing critical loader marks the process not ready.
    fn critical(&self) -> bool {
        false
    }

    /// Spawn instead of awaiting. Failures are only logged.
    fn is_async(&self) -> bool {
        false
    }

    async fn run(&self) -> Result<(), LoadError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderStatus {
    Completed,
    Failed(String),
    Spawned,
}

#[derive(Debug, Clone)]
pub struct LoaderOutcome {
    pub name: String,
    pub priority: i32,
    pub critical: bool,
    pub status: LoaderStatus,
    pub duration_ms: f64,
}

impl LoaderOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, LoaderStatus::Failed(_))
    }
}

/// Result of a startup run, one outcome per loader in execution order.
#[derive(Debug)]
pub struct StartupReport {
    pub outcomes: Vec<LoaderOutcome>,
    pub ready: bool,
    background: Vec<(String, JoinHandle<Result<(), LoadError>>)>,
}

impl StartupReport {
    /// Critical loaders that failed.
    pub fn critical_failures(&self) -> Vec<&LoaderOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.critical && o.is_failure())
            .collect()
    }

    /// Wait for spawned loaders, returning each one's result.
    pub async fn join_background(&mut self) -> Vec<(String, Result<(), LoadError>)> {
        let mut results = Vec::with_capacity(self.background.len());
        for (name, handle) in self.background.drain(..) {
            let result = match handle.await {
                Ok(result) => result,
                Err(_) => Err(LoadError::Aborted(name.clone())),
            };
            results.push((name, result));
        }
        results
    }
}

#[derive(Default)]
pub struct StartupSequence {
    loaders: Vec<Arc<dyn StartupLoader>>,
}

impl StartupSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(mut self, loader: Arc<dyn StartupLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Run every loader. Loaders of equal priority keep registration order.
    pub async fn run(mut self) -> StartupReport {
        self.loaders.sort_by_key(|l| l.priority());

        let mut outcomes = Vec::with_capacity(self.loaders.len());
        let mut background = Vec::new();
        let mut ready = true;

        for loader in self.loaders {
            let name = loader.name().to_string();
            let start = Instant::now();

            let status = if loader.is_async() {
                let task_loader = loader.clone();
                let handle = tokio::spawn(async move {
                    let result = task_loader.run().await;
                    if let Err(e) = &result {
                        tracing::warn!(
                            loader = %task_loader.name(),
                            error = %e,
                            "Background startup loader failed"
                        );
                    }
                    result
                });
                background.push((name.clone(), handle));
                LoaderStatus::Spawned
            } else {
                match loader.run().await {
                    Ok(()) => LoaderStatus::Completed,
                    Err(e) => {
                        if loader.critical() {
                            ready = false;
                            tracing::error!(
                                loader = %name,
                                error = %e,
                                "Critical startup loader failed, upload traffic will be refused"
                            );
                        } else {
                            tracing::warn!(loader = %name, error = %e, "Startup loader failed");
                        }
                        LoaderStatus::Failed(e.to_string())
                    }
                }
            };

            let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
            tracing::debug!(loader = %name, status = ?status, duration_ms, "Startup loader finished");
            outcomes.push(LoaderOutcome {
                name,
                priority: loader.priority(),
                critical: loader.critical(),
                status,
                duration_ms,
            });
        }

        tracing::info!(loaders = outcomes.len(), ready, "Startup sequence complete");
        StartupReport {
            outcomes,
            ready,
            background,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestow_core::ConfigError;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        priority: i32,
        critical: bool,
        is_async: bool,
        fail: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl StartupLoader for Recording {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn critical(&self) -> bool {
            self.critical
        }

        fn is_async(&self) -> bool {
            self.is_async
        }

        async fn run(&self) -> Result<(), LoadError> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                Err(ConfigError::NoPrimary.into())
            } else {
                Ok(())
            }
        }
    }

    fn loader(
        name: &'static str,
        priority: i32,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Recording {
        Recording {
            name,
            priority,
            critical: false,
            is_async: false,
            fail: false,
            log: log.clone(),
        }
    }

    #[tokio::test]
    async fn test_runs_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let report = StartupSequence::new()
            .with_loader(Arc::new(loader("late", 50, &log)))
            .with_loader(Arc::new(loader("first", 10, &log)))
            .with_loader(Arc::new(loader("second", 10, &log)))
            .run()
            .await;

        assert!(report.ready);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "late"]);
        let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "late"]);
    }

    #[tokio::test]
    async fn test_critical_failure_marks_not_ready_but_continues() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let report = StartupSequence::new()
            .with_loader(Arc::new(Recording {
                critical: true,
                fail: true,
                ..loader("storage", 10, &log)
            }))
            .with_loader(Arc::new(loader("other", 20, &log)))
            .run()
            .await;

        assert!(!report.ready);
        assert_eq!(report.critical_failures().len(), 1);
        assert_eq!(report.outcomes[1].status, LoaderStatus::Completed);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_critical_failure_keeps_ready() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let report = StartupSequence::new()
            .with_loader(Arc::new(Recording {
                fail: true,
                ..loader("optional", 10, &log)
            }))
            .run()
            .await;

        assert!(report.ready);
        assert!(report.outcomes[0].is_failure());
    }

    #[tokio::test]
    async fn test_async_loader_failure_is_reported_in_background() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut report = StartupSequence::new()
            .with_loader(Arc::new(Recording {
                is_async: true,
                fail: true,
                critical: true,
                ..loader("warmup", 5, &log)
            }))
            .with_loader(Arc::new(loader("next", 10, &log)))
            .run()
            .await;

        assert!(report.ready);
        assert_eq!(report.outcomes[0].status, LoaderStatus::Spawned);

        let background = report.join_background().await;
        assert_eq!(background.len(), 1);
        assert_eq!(background[0].0, "warmup");
        assert!(background[0].1.is_err());
        assert!(report.join_background().await.is_empty());
    }
}
