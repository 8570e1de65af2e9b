use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Storage backend kinds
///
/// Closed set of media a storage target can point at. It's defined in core
/// because it's used in configuration, the database and driver dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "backend_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendKind {
    /// Local filesystem under a configured upload path
    Local,
    /// S3-compatible object storage (MinIO, Ceph, AWS), path-style URLs
    ObjectStoreA,
    /// Vendor cloud object storage, virtual-hosted URLs
    ObjectStoreB,
    /// Network attached storage mounted into the process
    Nas,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Local,
        BackendKind::ObjectStoreA,
        BackendKind::ObjectStoreB,
        BackendKind::Nas,
    ];

    /// Whether transient failures on this backend are retried.
    pub fn is_remote(self) -> bool {
        !matches!(self, BackendKind::Local)
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "local" => Ok(BackendKind::Local),
            "object_store_a" | "s3" => Ok(BackendKind::ObjectStoreA),
            "object_store_b" | "oss" => Ok(BackendKind::ObjectStoreB),
            "nas" | "nfs" => Ok(BackendKind::Nas),
            _ => Err(anyhow::anyhow!("Invalid storage backend: {}", s)),
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            BackendKind::Local => write!(f, "LOCAL"),
            BackendKind::ObjectStoreA => write!(f, "OBJECT_STORE_A"),
            BackendKind::ObjectStoreB => write!(f, "OBJECT_STORE_B"),
            BackendKind::Nas => write!(f, "NAS"),
        }
    }
}
