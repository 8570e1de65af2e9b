//! Object-store driver covering both object-store backends.
//!
//! `OBJECT_STORE_A` talks to S3-compatible services (MinIO, Ceph, AWS) with
//! path-style addressing; `OBJECT_STORE_B` talks to vendor clouds that expect
//! virtual-hosted buckets. Both go through `object_store`'s S3 client, so the
//! only differences are request addressing and public URL construction.

use crate::retry::{RetryError, RetryPolicy};
use crate::traits::{BackendDriver, StoredLocation};
use async_trait::async_trait;
use bytes::Bytes;
use filestow_core::{BackendKind, ObjectStoreSettings, StorageError, StorageResult};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{DynObjectStore, ObjectStoreExt, PutPayload};
use std::sync::Arc;

const TRASH_PREFIX: &str = "trash";
const PROBE_KEY: &str = ".filestow-probe";
const DEFAULT_REGION: &str = "us-east-1";

/// How public URLs (and requests) address the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlStyle {
    /// `{endpoint}/{bucket}/{key}`
    PathStyle,
    /// `{scheme}://{bucket}.{host}/{key}`
    VirtualHosted,
}

impl UrlStyle {
    pub fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::ObjectStoreB => UrlStyle::VirtualHosted,
            _ => UrlStyle::PathStyle,
        }
    }
}

/// Object storage driver
#[derive(Clone)]
pub struct ObjectStoreDriver {
    kind: BackendKind,
    store: Arc<DynObjectStore>,
    bucket: String,
    public_base: String,
    retry: RetryPolicy,
}

fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// `https://host` + `bucket` -> `https://bucket.host`
fn virtual_host(endpoint: &str, bucket: &str) -> String {
    match endpoint.split_once("://") {
        Some((scheme, host)) => format!("{}://{}.{}", scheme, bucket, host),
        None => format!("https://{}.{}", bucket, endpoint),
    }
}

fn public_base(settings: &ObjectStoreSettings, style: UrlStyle) -> String {
    if let Some(domain) = &settings.file_domain {
        return domain.clone();
    }
    let endpoint = normalize_endpoint(&settings.endpoint);
    match style {
        UrlStyle::PathStyle => format!("{}/{}", endpoint, settings.bucket),
        UrlStyle::VirtualHosted => virtual_host(&endpoint, &settings.bucket),
    }
}

fn is_transient(e: &ObjectStoreError) -> bool {
    !matches!(
        e,
        ObjectStoreError::NotFound { .. }
            | ObjectStoreError::AlreadyExists { .. }
            | ObjectStoreError::Precondition { .. }
            | ObjectStoreError::NotModified { .. }
            | ObjectStoreError::NotSupported { .. }
            | ObjectStoreError::InvalidPath { .. }
            | ObjectStoreError::PermissionDenied { .. }
            | ObjectStoreError::Unauthenticated { .. }
            | ObjectStoreError::UnknownConfigurationKey { .. }
    )
}

fn map_retry(
    operation: &'static str,
    path: &str,
    err: RetryError<ObjectStoreError>,
) -> StorageError {
    match err {
        RetryError::Exhausted { attempts, last } => StorageError::Unavailable {
            operation,
            attempts,
            cause: last.to_string(),
        },
        RetryError::Permanent(ObjectStoreError::NotFound { .. }) => {
            StorageError::NotFound(path.to_string())
        }
        RetryError::Permanent(other) => StorageError::Backend(other.to_string()),
    }
}

async fn delete_if_exists(store: &Arc<DynObjectStore>, location: &Path) -> object_store::Result<()> {
    match store.delete(location).await {
        Err(ObjectStoreError::NotFound { .. }) => Ok(()),
        other => other,
    }
}

impl ObjectStoreDriver {
    /// Build an S3 client from target settings. No request is issued here;
    /// call `probe` to check reachability.
    pub fn build(
        kind: BackendKind,
        settings: &ObjectStoreSettings,
        retry: RetryPolicy,
    ) -> StorageResult<Self> {
        let style = UrlStyle::for_kind(kind);
        let endpoint = normalize_endpoint(&settings.endpoint);

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_access_key_id(&settings.access_key)
            .with_secret_access_key(&settings.secret_key)
            .with_region(
                settings
                    .region
                    .clone()
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            )
            .with_allow_http(endpoint.starts_with("http://"));

        builder = match style {
            UrlStyle::PathStyle => builder.with_endpoint(endpoint),
            UrlStyle::VirtualHosted => builder
                .with_endpoint(virtual_host(&endpoint, &settings.bucket))
                .with_virtual_hosted_style_request(true),
        };

        let store = builder
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self::with_store(kind, settings, Arc::new(store), retry))
    }

    /// Wrap an already constructed object store (e.g. `InMemory` in tests).
    pub fn with_store(
        kind: BackendKind,
        settings: &ObjectStoreSettings,
        store: Arc<DynObjectStore>,
        retry: RetryPolicy,
    ) -> Self {
        ObjectStoreDriver {
            kind,
            store,
            bucket: settings.bucket.clone(),
            public_base: public_base(settings, UrlStyle::for_kind(kind)),
            retry,
        }
    }

    /// Cheap reachability check: a single HEAD on a probe key. A missing key
    /// still proves the bucket answers.
    pub async fn probe(&self) -> StorageResult<()> {
        match self.store.head(&Path::from(PROBE_KEY)).await {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(StorageError::Backend(format!(
                "bucket '{}' is not reachable: {}",
                self.bucket, e
            ))),
        }
    }

    fn live_key(path: &str) -> StorageResult<Path> {
        crate::keys::validate_path(path)?;
        Ok(Path::from(path))
    }

    fn trash_key(location: &StoredLocation) -> StorageResult<Path> {
        let relative = location.trash_relative();
        crate::keys::validate_path(&relative)?;
        Ok(Path::from(format!("{}/{}", TRASH_PREFIX, relative)))
    }

    async fn exists(&self, operation: &'static str, location: &Path) -> StorageResult<bool> {
        let store = &self.store;
        let found = self
            .retry
            .run(operation, || async move { store.head(location).await }, is_transient)
            .await;
        match found {
            Ok(_) => Ok(true),
            Err(RetryError::Permanent(ObjectStoreError::NotFound { .. })) => Ok(false),
            Err(e) => Err(map_retry(operation, location.as_ref(), e)),
        }
    }

    /// Copy `from` to `to` then delete `from`. A second call after success is
    /// a no-op.
    async fn relocate(
        &self,
        operation: &'static str,
        display: &str,
        from: &Path,
        to: &Path,
    ) -> StorageResult<()> {
        let store = &self.store;
        let copied = self
            .retry
            .run(operation, || async move { store.copy(from, to).await }, is_transient)
            .await;
        match copied {
            Ok(()) => {}
            Err(RetryError::Permanent(ObjectStoreError::NotFound { .. })) => {
                if self.exists(operation, to).await? {
                    return Ok(());
                }
                return Err(StorageError::NotFound(display.to_string()));
            }
            Err(e) => return Err(map_retry(operation, display, e)),
        }

        self.retry
            .run(operation, || delete_if_exists(store, from), is_transient)
            .await
            .map_err(|e| map_retry(operation, display, e))
    }
}

#[async_trait]
impl BackendDriver for ObjectStoreDriver {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn store(&self, relative_path: &str, payload: Bytes) -> StorageResult<StoredLocation> {
        let location = Self::live_key(relative_path)?;
        let size = payload.len() as u64;
        let start = std::time::Instant::now();
        let (store, loc, data) = (&self.store, &location, &payload);

        self.retry
            .run(
                "store",
                || async move { store.put(loc, PutPayload::from(data.clone())).await },
                is_transient,
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    bucket = %self.bucket,
                    key = %relative_path,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object store upload failed"
                );
                map_retry("store", relative_path, e)
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %relative_path,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store upload successful"
        );

        Ok(StoredLocation {
            path: relative_path.to_string(),
            size_bytes: Some(size),
            trash_scope: None,
        })
    }

    async fn fetch(&self, location: &StoredLocation) -> StorageResult<Bytes> {
        let key = Self::live_key(&location.path)?;
        let start = std::time::Instant::now();
        let (store, key) = (&self.store, &key);

        let bytes = self
            .retry
            .run(
                "fetch",
                || async move { store.get(key).await?.bytes().await },
                is_transient,
            )
            .await
            .map_err(|e| map_retry("fetch", &location.path, e))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %location.path,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object store download successful"
        );

        Ok(bytes)
    }

    fn fetch_url(&self, location: &StoredLocation) -> String {
        format!("{}/{}", self.public_base, location.path)
    }

    async fn move_to_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = Self::live_key(&location.path)?;
        let trash = Self::trash_key(location)?;
        self.relocate("move_to_trash", &location.path, &live, &trash)
            .await?;

        tracing::info!(bucket = %self.bucket, key = %location.path, "Object moved to trash");
        Ok(())
    }

    async fn copy_to_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = Self::live_key(&location.path)?;
        let trash = Self::trash_key(location)?;
        let (store, live, trash) = (&self.store, &live, &trash);
        self.retry
            .run(
                "copy_to_trash",
                || async move { store.copy(live, trash).await },
                is_transient,
            )
            .await
            .map_err(|e| map_retry("copy_to_trash", &location.path, e))?;

        tracing::info!(bucket = %self.bucket, key = %location.path, "Object copied to trash");
        Ok(())
    }

    async fn restore_from_trash(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = Self::live_key(&location.path)?;
        let trash = Self::trash_key(location)?;
        self.relocate("restore_from_trash", &location.path, &trash, &live)
            .await?;

        tracing::info!(bucket = %self.bucket, key = %location.path, "Object restored from trash");
        Ok(())
    }

    async fn purge(&self, location: &StoredLocation) -> StorageResult<()> {
        let live = Self::live_key(&location.path)?;
        let trash = Self::trash_key(location)?;
        let (store, live, trash) = (&self.store, &live, &trash);

        self.retry
            .run(
                "purge",
                || async move {
                    delete_if_exists(store, live).await?;
                    delete_if_exists(store, trash).await
                },
                is_transient,
            )
            .await
            .map_err(|e| map_retry("purge", &location.path, e))?;

        tracing::info!(bucket = %self.bucket, key = %location.path, "Object purge successful");
        Ok(())
    }

    async fn purge_trashed(&self, location: &StoredLocation) -> StorageResult<()> {
        let trash = Self::trash_key(location)?;
        let store = &self.store;
        self.retry
            .run("purge_trashed", || delete_if_exists(store, &trash), is_transient)
            .await
            .map_err(|e| map_retry("purge_trashed", &location.path, e))?;

        tracing::info!(bucket = %self.bucket, key = %location.path, "Trashed object purged");
        Ok(())
    }

    async fn used_space(&self) -> StorageResult<i64> {
        Err(StorageError::Unsupported {
            operation: "used_space",
            kind: self.kind,
        })
    }
}

#[cfg(all(test, feature = "storage-object"))]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn settings(domain: Option<&str>) -> ObjectStoreSettings {
        ObjectStoreSettings {
            endpoint: "http://minio.local:9000".to_string(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            bucket: "files".to_string(),
            region: None,
            file_domain: domain.map(String::from),
        }
    }

    fn driver(kind: BackendKind) -> ObjectStoreDriver {
        ObjectStoreDriver::with_store(
            kind,
            &settings(None),
            Arc::new(InMemory::new()),
            RetryPolicy::immediate(3),
        )
    }

    #[test]
    fn test_url_styles() {
        let loc = StoredLocation::at("2026/01/01/abc.png");
        assert_eq!(
            driver(BackendKind::ObjectStoreA).fetch_url(&loc),
            "http://minio.local:9000/files/2026/01/01/abc.png"
        );
        assert_eq!(
            driver(BackendKind::ObjectStoreB).fetch_url(&loc),
            "http://files.minio.local:9000/2026/01/01/abc.png"
        );

        let cdn = ObjectStoreDriver::with_store(
            BackendKind::ObjectStoreB,
            &settings(Some("https://cdn.example.com")),
            Arc::new(InMemory::new()),
            RetryPolicy::immediate(1),
        );
        assert_eq!(cdn.fetch_url(&loc), "https://cdn.example.com/2026/01/01/abc.png");
    }

    #[test]
    fn test_endpoint_without_scheme_defaults_to_https() {
        assert_eq!(normalize_endpoint("oss.example.com/"), "https://oss.example.com");
        assert_eq!(
            virtual_host("https://oss.example.com", "bkt"),
            "https://bkt.oss.example.com"
        );
    }

    #[tokio::test]
    async fn test_probe_accepts_empty_bucket() {
        driver(BackendKind::ObjectStoreA).probe().await.unwrap();
    }

    #[tokio::test]
    async fn test_store_fetch_trash_restore() {
        let driver = driver(BackendKind::ObjectStoreA);
        let loc = driver
            .store("2026/01/01/abc.txt", Bytes::from_static(b"object bytes"))
            .await
            .unwrap();
        assert_eq!(&driver.fetch(&loc).await.unwrap()[..], b"object bytes");

        driver.move_to_trash(&loc).await.unwrap();
        assert!(matches!(
            driver.fetch(&loc).await,
            Err(StorageError::NotFound(_))
        ));
        // repeated move is harmless
        driver.move_to_trash(&loc).await.unwrap();

        driver.restore_from_trash(&loc).await.unwrap();
        assert_eq!(&driver.fetch(&loc).await.unwrap()[..], b"object bytes");
    }

    #[tokio::test]
    async fn test_trash_missing_object_is_not_found() {
        let driver = driver(BackendKind::ObjectStoreB);
        let result = driver.move_to_trash(&StoredLocation::at("missing.bin")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_purge_twice_succeeds() {
        let driver = driver(BackendKind::ObjectStoreA);
        let loc = driver
            .store("p/q.bin", Bytes::from_static(b"x"))
            .await
            .unwrap();
        driver.move_to_trash(&loc).await.unwrap();

        driver.purge(&loc).await.unwrap();
        driver.purge(&loc).await.unwrap();
        assert!(matches!(
            driver.restore_from_trash(&loc).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_trash_keys_are_scoped_per_owner() {
        let driver = driver(BackendKind::ObjectStoreB);
        driver
            .store("d/e.bin", Bytes::from_static(b"twice"))
            .await
            .unwrap();
        let kept = StoredLocation::at("d/e.bin").in_trash_scope("kept");
        let dropped = StoredLocation::at("d/e.bin").in_trash_scope("dropped");

        driver.copy_to_trash(&kept).await.unwrap();
        assert_eq!(&driver.fetch(&dropped).await.unwrap()[..], b"twice");
        driver.move_to_trash(&dropped).await.unwrap();
        driver.purge_trashed(&dropped).await.unwrap();
        assert!(driver
            .exists("head", &Path::from("trash/kept/d/e.bin"))
            .await
            .unwrap());
        assert!(!driver
            .exists("head", &Path::from("trash/dropped/d/e.bin"))
            .await
            .unwrap());

        driver.restore_from_trash(&kept).await.unwrap();
        assert_eq!(&driver.fetch(&kept).await.unwrap()[..], b"twice");
    }

    #[tokio::test]
    async fn test_copy_missing_object_to_trash_is_not_found() {
        let driver = driver(BackendKind::ObjectStoreA);
        let loc = StoredLocation::at("absent.bin").in_trash_scope("owner");
        assert!(matches!(
            driver.copy_to_trash(&loc).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_used_space_unsupported() {
        let result = driver(BackendKind::ObjectStoreA).used_space().await;
        assert!(matches!(
            result,
            Err(StorageError::Unsupported {
                operation: "used_space",
                kind: BackendKind::ObjectStoreA
            })
        ));
    }

    #[test]
    fn test_not_found_is_not_transient() {
        let err = ObjectStoreError::NotFound {
            path: "x".to_string(),
            source: "missing".into(),
        };
        assert!(!is_transient(&err));
        let err = ObjectStoreError::Generic {
            store: "S3",
            source: "connection reset".into(),
        };
        assert!(is_transient(&err));
    }
}
