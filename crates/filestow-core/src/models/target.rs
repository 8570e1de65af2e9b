//! Storage target model: a named, configured destination files can be stored under.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};

use super::settings::{keys, BackendSettings};
use crate::error::ConfigError;
use crate::storage_types::BackendKind;

fn default_true() -> bool {
    true
}

/// A persisted storage target configuration entry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageTarget {
    pub key: String,
    pub backend_type: BackendKind,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_true")]
    pub trash_enabled: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl StorageTarget {
    pub fn new(key: impl Into<String>, backend_type: BackendKind) -> Self {
        Self {
            key: key.into(),
            backend_type,
            settings: BTreeMap::new(),
            is_primary: false,
            trash_enabled: true,
            enabled: true,
        }
    }

    pub fn with_setting(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(name.into(), value.into());
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    pub fn without_trash(mut self) -> Self {
        self.trash_enabled = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validate the key and the settings required by the backend type.
    pub fn validate(&self) -> Result<BackendSettings, ConfigError> {
        let key = self.key.trim();
        if key.is_empty() {
            return Err(ConfigError::invalid(&self.key, "key must not be empty"));
        }
        if key.eq_ignore_ascii_case(TargetRef::PRIMARY) {
            return Err(ConfigError::invalid(
                &self.key,
                "'primary' is reserved for primary target lookups",
            ));
        }
        BackendSettings::parse(&self.key, self.backend_type, &self.settings)
    }

    /// Whether deletes on this target go to the trash. A local target with
    /// `realDelete` set always erases immediately.
    pub fn uses_trash(&self) -> bool {
        if !self.trash_enabled {
            return false;
        }
        let real_delete = self
            .settings
            .get(keys::REAL_DELETE)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        !(self.backend_type == BackendKind::Local && real_delete)
    }
}

impl Debug for StorageTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let settings: BTreeMap<&str, &str> = self
            .settings
            .iter()
            .map(|(name, value)| {
                let shown = if name == keys::SECRET_KEY {
                    "<redacted>"
                } else {
                    value.as_str()
                };
                (name.as_str(), shown)
            })
            .collect();
        f.debug_struct("StorageTarget")
            .field("key", &self.key)
            .field("backend_type", &self.backend_type)
            .field("settings", &settings)
            .field("is_primary", &self.is_primary)
            .field("trash_enabled", &self.trash_enabled)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// How a caller names the target an operation should run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TargetRef {
    #[default]
    Primary,
    Key(String),
}

impl TargetRef {
    pub const PRIMARY: &'static str = "primary";
}

impl From<&str> for TargetRef {
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(Self::PRIMARY) {
            TargetRef::Primary
        } else {
            TargetRef::Key(trimmed.to_string())
        }
    }
}

impl From<String> for TargetRef {
    fn from(value: String) -> Self {
        TargetRef::from(value.as_str())
    }
}

impl From<Option<&str>> for TargetRef {
    fn from(value: Option<&str>) -> Self {
        value.map(TargetRef::from).unwrap_or_default()
    }
}

impl Display for TargetRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TargetRef::Primary => write!(f, "{}", Self::PRIMARY),
            TargetRef::Key(key) => write!(f, "{}", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_ref_primary_aliases() {
        assert_eq!(TargetRef::from("primary"), TargetRef::Primary);
        assert_eq!(TargetRef::from("PRIMARY"), TargetRef::Primary);
        assert_eq!(TargetRef::from(""), TargetRef::Primary);
        assert_eq!(TargetRef::from(None::<&str>), TargetRef::Primary);
        assert_eq!(TargetRef::from("nas-1"), TargetRef::Key("nas-1".into()));
    }

    #[test]
    fn test_reserved_key_rejected() {
        let target = StorageTarget::new("primary", BackendKind::Local)
            .with_setting(keys::UPLOAD_PATH, "/tmp");
        assert!(target.validate().is_err());
    }

    #[test]
    fn test_real_delete_disables_trash_for_local_only() {
        let local = StorageTarget::new("disk", BackendKind::Local)
            .with_setting(keys::UPLOAD_PATH, "/tmp")
            .with_setting(keys::REAL_DELETE, "true");
        assert!(!local.uses_trash());

        let nas = StorageTarget::new("nas", BackendKind::Nas)
            .with_setting(keys::MOUNT_POINT, "/mnt")
            .with_setting(keys::REAL_DELETE, "true");
        assert!(nas.uses_trash());

        assert!(!nas.without_trash().uses_trash());
    }

    #[test]
    fn test_debug_redacts_secret_key() {
        let target = StorageTarget::new("cloud", BackendKind::ObjectStoreA)
            .with_setting(keys::ACCESS_KEY, "AKIDEXAMPLE")
            .with_setting(keys::SECRET_KEY, "wJalrXUtnFEMI");
        let printed = format!("{:?}", target);
        assert!(!printed.contains("wJalrXUtnFEMI"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("AKIDEXAMPLE"));
        assert!(printed.contains("cloud"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let target: StorageTarget = serde_json::from_str(
            r#"{"key":"disk","backendType":"LOCAL","settings":{"uploadPath":"/srv"}}"#,
        )
        .unwrap();
        assert!(target.enabled);
        assert!(target.trash_enabled);
        assert!(!target.is_primary);
    }
}
