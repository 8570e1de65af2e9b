//! Filestow admin CLI.
//!
//! Configuration comes from the environment (see `filestow_core::Config`).
//! With `DATABASE_URL` set, targets and file records live in Postgres;
//! otherwise targets are read from `FILESTOW_TARGETS_FILE` and records are
//! kept only for the lifetime of the process.

pub mod commands;
pub mod setup;

use anyhow::Context;
use filestow_core::settings_keys as keys;
use filestow_core::StorageTarget;
use serde::Serialize;

pub use commands::{Cli, Commands, TargetCommands};

const REDACTED: &str = "********";

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// `key=value` from the command line.
pub fn parse_setting(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty setting name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Copy of `target` safe to print.
pub fn redact(target: &StorageTarget) -> StorageTarget {
    let mut target = target.clone();
    if let Some(secret) = target.settings.get_mut(keys::SECRET_KEY) {
        *secret = REDACTED.to_string();
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use filestow_core::BackendKind;

    #[test]
    fn parse_setting_splits_on_first_equals() {
        assert_eq!(
            parse_setting("endpoint=https://a.example.com/?x=1").unwrap(),
            (
                "endpoint".to_string(),
                "https://a.example.com/?x=1".to_string()
            )
        );
        assert_eq!(
            parse_setting("fileDomain=").unwrap(),
            ("fileDomain".to_string(), String::new())
        );
    }

    #[test]
    fn parse_setting_rejects_garbage() {
        assert!(parse_setting("novalue").is_err());
        assert!(parse_setting("=value").is_err());
    }

    #[test]
    fn redact_hides_secret_only() {
        let target = StorageTarget::new("s3", BackendKind::ObjectStoreA)
            .with_setting(keys::ACCESS_KEY, "AK")
            .with_setting(keys::SECRET_KEY, "very-secret");
        let shown = redact(&target);
        assert_eq!(shown.settings[keys::SECRET_KEY], REDACTED);
        assert_eq!(shown.settings[keys::ACCESS_KEY], "AK");
        assert_eq!(target.settings[keys::SECRET_KEY], "very-secret");
    }
}
