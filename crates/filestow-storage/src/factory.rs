//! Driver construction.
//!
//! Each `BackendKind` is paired with a constructor in `CONSTRUCTORS`. A kind
//! whose feature is compiled out has no entry and fails construction.

use crate::retry::RetryPolicy;
use crate::traits::BackendDriver;
use filestow_core::{BackendKind, BackendSettings, ConfigError, DriverError, StorageResult, StorageTarget};
use futures::future::BoxFuture;
#[cfg(feature = "storage-object")]
use object_store::DynObjectStore;
#[cfg(feature = "storage-object")]
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a driver for one target. Construction includes a reachability probe.
pub type DriverConstructor = for<'a> fn(
    &'a StorageTarget,
    &'a DriverOptions,
) -> BoxFuture<'a, StorageResult<Arc<dyn BackendDriver>>>;

/// Knobs shared by every constructor.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// Retry schedule for NAS and object-store drivers.
    pub retry: RetryPolicy,
    /// Pre-built object stores by target key, used instead of an S3 client.
    #[cfg(feature = "storage-object")]
    pub object_stores: HashMap<String, Arc<DynObjectStore>>,
}

impl DriverOptions {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..Default::default()
        }
    }

    #[cfg(feature = "storage-object")]
    pub fn with_object_store(mut self, key: impl Into<String>, store: Arc<DynObjectStore>) -> Self {
        self.object_stores.insert(key.into(), store);
        self
    }
}

static CONSTRUCTORS: &[(BackendKind, DriverConstructor)] = &[
    #[cfg(feature = "storage-local")]
    (BackendKind::Local, construct_local),
    #[cfg(feature = "storage-object")]
    (BackendKind::ObjectStoreA, construct_object_store),
    #[cfg(feature = "storage-object")]
    (BackendKind::ObjectStoreB, construct_object_store),
    #[cfg(feature = "storage-nas")]
    (BackendKind::Nas, construct_nas),
];

/// Look up the constructor registered for `kind`.
pub fn constructor_for(kind: BackendKind) -> Option<DriverConstructor> {
    CONSTRUCTORS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, constructor)| *constructor)
}

fn settings_mismatch(target: &StorageTarget) -> ConfigError {
    ConfigError::invalid(
        &target.key,
        format!("settings do not describe a {} target", target.backend_type),
    )
}

#[cfg(feature = "storage-local")]
fn construct_local<'a>(
    target: &'a StorageTarget,
    _options: &'a DriverOptions,
) -> BoxFuture<'a, StorageResult<Arc<dyn BackendDriver>>> {
    Box::pin(async move {
        let BackendSettings::Local(settings) = target.validate()? else {
            return Err(settings_mismatch(target).into());
        };
        let driver = crate::local::LocalDriver::new(&settings).await?;
        Ok(Arc::new(driver) as Arc<dyn BackendDriver>)
    })
}

#[cfg(feature = "storage-nas")]
fn construct_nas<'a>(
    target: &'a StorageTarget,
    options: &'a DriverOptions,
) -> BoxFuture<'a, StorageResult<Arc<dyn BackendDriver>>> {
    Box::pin(async move {
        let BackendSettings::Nas(settings) = target.validate()? else {
            return Err(settings_mismatch(target).into());
        };
        let driver = crate::nas::NasDriver::new(&settings, options.retry.clone()).await?;
        Ok(Arc::new(driver) as Arc<dyn BackendDriver>)
    })
}

#[cfg(feature = "storage-object")]
fn construct_object_store<'a>(
    target: &'a StorageTarget,
    options: &'a DriverOptions,
) -> BoxFuture<'a, StorageResult<Arc<dyn BackendDriver>>> {
    use crate::object::ObjectStoreDriver;

    Box::pin(async move {
        let BackendSettings::ObjectStore(settings) = target.validate()? else {
            return Err(settings_mismatch(target).into());
        };
        let kind = target.backend_type;
        let driver = match options.object_stores.get(&target.key) {
            Some(store) => {
                ObjectStoreDriver::with_store(kind, &settings, store.clone(), options.retry.clone())
            }
            None => ObjectStoreDriver::build(kind, &settings, options.retry.clone())?,
        };
        driver.probe().await?;
        Ok(Arc::new(driver) as Arc<dyn BackendDriver>)
    })
}

/// Construct the driver for `target`, mapping every failure to
/// `DriverError::ConstructionFailed`.
pub async fn create_driver(
    target: &StorageTarget,
    options: &DriverOptions,
) -> Result<Arc<dyn BackendDriver>, DriverError> {
    let failed = |cause: String| DriverError::ConstructionFailed {
        key: target.key.clone(),
        kind: target.backend_type,
        cause,
    };

    let constructor = constructor_for(target.backend_type).ok_or_else(|| {
        failed(format!(
            "{} support is not compiled into this build",
            target.backend_type
        ))
    })?;

    let start = std::time::Instant::now();
    match constructor(target, options).await {
        Ok(driver) => {
            tracing::info!(
                key = %target.key,
                backend = %target.backend_type,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Storage driver constructed"
            );
            Ok(driver)
        }
        Err(e) => {
            tracing::warn!(
                key = %target.key,
                backend = %target.backend_type,
                error = %e,
                "Storage driver construction failed"
            );
            Err(failed(e.to_string()))
        }
    }
}

#[cfg(all(
    test,
    feature = "storage-local",
    feature = "storage-nas",
    feature = "storage-object"
))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use filestow_core::settings_keys as keys;
    use object_store::memory::InMemory;
    use tempfile::tempdir;

    #[test]
    fn test_every_kind_has_a_constructor() {
        for kind in BackendKind::ALL {
            assert!(constructor_for(kind).is_some(), "{} missing", kind);
        }
    }

    #[tokio::test]
    async fn test_create_local_driver() {
        let dir = tempdir().unwrap();
        let target = StorageTarget::new("disk", BackendKind::Local)
            .with_setting(keys::UPLOAD_PATH, dir.path().join("up").display().to_string());

        let driver = create_driver(&target, &DriverOptions::default()).await.unwrap();
        assert_eq!(driver.kind(), BackendKind::Local);
        assert!(dir.path().join("up").is_dir());
    }

    #[tokio::test]
    async fn test_invalid_settings_fail_construction() {
        let target = StorageTarget::new("s3", BackendKind::ObjectStoreA)
            .with_setting(keys::ENDPOINT, "http://minio:9000");

        let err = create_driver(&target, &DriverOptions::default())
            .await
            .err()
            .unwrap();
        match err {
            DriverError::ConstructionFailed { key, kind, cause } => {
                assert_eq!(key, "s3");
                assert_eq!(kind, BackendKind::ObjectStoreA);
                assert!(cause.contains("accessKey"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unmounted_nas_fails_construction() {
        let dir = tempdir().unwrap();
        let target = StorageTarget::new("nas", BackendKind::Nas)
            .with_setting(keys::MOUNT_POINT, dir.path().join("absent").display().to_string());

        let result = create_driver(&target, &DriverOptions::new(RetryPolicy::immediate(1))).await;
        assert!(matches!(
            result,
            Err(DriverError::ConstructionFailed { kind: BackendKind::Nas, .. })
        ));
    }

    #[tokio::test]
    async fn test_injected_object_store_is_used() {
        let target = StorageTarget::new("cloud", BackendKind::ObjectStoreB)
            .with_setting(keys::ENDPOINT, "https://oss.example.com")
            .with_setting(keys::ACCESS_KEY, "AK")
            .with_setting(keys::SECRET_KEY, "SK")
            .with_setting(keys::BUCKET, "media");
        let options = DriverOptions::new(RetryPolicy::immediate(1))
            .with_object_store("cloud", Arc::new(InMemory::new()));

        let driver = create_driver(&target, &options).await.unwrap();
        let loc = driver
            .store("2026/10/18/abc.txt", Bytes::from_static(b"hi"))
            .await
            .unwrap();
        assert_eq!(
            driver.fetch_url(&loc),
            "https://media.oss.example.com/2026/10/18/abc.txt"
        );
    }
}
