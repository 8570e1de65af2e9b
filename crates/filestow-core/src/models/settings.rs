//! Typed views over the string-keyed settings map persisted per storage target.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::storage_types::BackendKind;

/// Recognized settings keys.
pub mod keys {
    pub const UPLOAD_PATH: &str = "uploadPath";
    pub const FILE_DOMAIN: &str = "fileDomain";
    pub const REAL_DELETE: &str = "realDelete";
    pub const ENDPOINT: &str = "endpoint";
    pub const ACCESS_KEY: &str = "accessKey";
    pub const SECRET_KEY: &str = "secretKey";
    pub const BUCKET: &str = "bucket";
    pub const REGION: &str = "region";
    pub const MOUNT_POINT: &str = "mountPoint";
}

/// Settings for a `LOCAL` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    pub upload_path: PathBuf,
    pub file_domain: Option<String>,
    /// When set, deletes bypass the trash and erase bytes immediately.
    pub real_delete: bool,
}

/// Settings shared by both object-store variants.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStoreSettings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: Option<String>,
    pub file_domain: Option<String>,
}

impl fmt::Debug for ObjectStoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("file_domain", &self.file_domain)
            .finish()
    }
}

/// Settings for a `NAS` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NasSettings {
    pub mount_point: PathBuf,
    pub file_domain: Option<String>,
}

/// Validated, backend-specific settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSettings {
    Local(LocalSettings),
    ObjectStore(ObjectStoreSettings),
    Nas(NasSettings),
}

impl BackendSettings {
    /// Validate the raw settings map of target `key` for backend `kind`.
    pub fn parse(
        key: &str,
        kind: BackendKind,
        raw: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let reader = SettingsReader { key, raw };
        match kind {
            BackendKind::Local => Ok(BackendSettings::Local(LocalSettings {
                upload_path: PathBuf::from(reader.required(keys::UPLOAD_PATH)?),
                file_domain: reader.domain()?,
                real_delete: reader.flag(keys::REAL_DELETE)?,
            })),
            BackendKind::ObjectStoreA | BackendKind::ObjectStoreB => {
                Ok(BackendSettings::ObjectStore(ObjectStoreSettings {
                    endpoint: reader.required(keys::ENDPOINT)?.trim_end_matches('/').to_string(),
                    access_key: reader.required(keys::ACCESS_KEY)?,
                    secret_key: reader.required(keys::SECRET_KEY)?,
                    bucket: reader.required(keys::BUCKET)?,
                    region: reader.optional(keys::REGION),
                    file_domain: reader.domain()?,
                }))
            }
            BackendKind::Nas => Ok(BackendSettings::Nas(NasSettings {
                mount_point: PathBuf::from(reader.required(keys::MOUNT_POINT)?),
                file_domain: reader.domain()?,
            })),
        }
    }
}

struct SettingsReader<'a> {
    key: &'a str,
    raw: &'a BTreeMap<String, String>,
}

impl SettingsReader<'_> {
    fn optional(&self, name: &str) -> Option<String> {
        self.raw
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(String::from)
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::invalid(self.key, format!("'{}' is required", name)))
    }

    fn flag(&self, name: &str) -> Result<bool, ConfigError> {
        match self.optional(name).map(|v| v.to_lowercase()).as_deref() {
            None | Some("false") | Some("0") | Some("no") => Ok(false),
            Some("true") | Some("1") | Some("yes") => Ok(true),
            Some(other) => Err(ConfigError::invalid(
                self.key,
                format!("'{}' must be a boolean, got '{}'", name, other),
            )),
        }
    }

    fn domain(&self) -> Result<Option<String>, ConfigError> {
        match self.optional(keys::FILE_DOMAIN) {
            None => Ok(None),
            Some(d) if d.starts_with("http://") || d.starts_with("https://") || d.starts_with('/') => {
                Ok(Some(d.trim_end_matches('/').to_string()))
            }
            Some(d) => Err(ConfigError::invalid(
                self.key,
                format!("'{}' must be an absolute URL or path, got '{}'", keys::FILE_DOMAIN, d),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_local_requires_upload_path() {
        let err = BackendSettings::parse("disk", BackendKind::Local, &map(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings { .. }));
        assert!(err.to_string().contains("uploadPath"));
    }

    #[test]
    fn test_local_parses_real_delete() {
        let parsed = BackendSettings::parse(
            "disk",
            BackendKind::Local,
            &map(&[("uploadPath", "/srv/files"), ("realDelete", "TRUE")]),
        )
        .unwrap();
        match parsed {
            BackendSettings::Local(s) => {
                assert!(s.real_delete);
                assert_eq!(s.upload_path, PathBuf::from("/srv/files"));
            }
            other => panic!("unexpected settings: {:?}", other),
        }
    }

    #[test]
    fn test_bad_boolean_rejected() {
        let err = BackendSettings::parse(
            "disk",
            BackendKind::Local,
            &map(&[("uploadPath", "/srv"), ("realDelete", "maybe")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn test_object_store_requires_credentials() {
        let err = BackendSettings::parse(
            "s3",
            BackendKind::ObjectStoreA,
            &map(&[("endpoint", "http://minio:9000"), ("bucket", "files")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("accessKey"));
    }

    #[test]
    fn test_object_store_trims_endpoint_and_redacts_secret() {
        let parsed = BackendSettings::parse(
            "s3",
            BackendKind::ObjectStoreB,
            &map(&[
                ("endpoint", "https://oss.example.com/"),
                ("accessKey", "AK"),
                ("secretKey", "very-secret"),
                ("bucket", "files"),
                ("fileDomain", "https://cdn.example.com/"),
            ]),
        )
        .unwrap();
        let BackendSettings::ObjectStore(s) = parsed else {
            panic!("expected object store settings");
        };
        assert_eq!(s.endpoint, "https://oss.example.com");
        assert_eq!(s.file_domain.as_deref(), Some("https://cdn.example.com"));
        assert!(!format!("{:?}", s).contains("very-secret"));
    }

    #[test]
    fn test_file_domain_must_be_absolute() {
        let err = BackendSettings::parse(
            "nas",
            BackendKind::Nas,
            &map(&[("mountPoint", "/mnt/nas"), ("fileDomain", "cdn.example.com")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("fileDomain"));
    }
}
