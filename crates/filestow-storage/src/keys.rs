//! Shared path derivation for storage backends.
//!
//! Layout: `YYYY/MM/DD/{md5}.{ext}` for originals, `YYYY/MM/DD/{md5}_thumb.{ext}`
//! for derivatives. The checksum in the path makes identical payloads stored
//! on the same day collide on purpose, and different payloads never do.

use chrono::{Datelike, NaiveDate};
use filestow_core::{StorageError, StorageResult};

const DERIVATIVE_SUFFIX: &str = "_thumb";

/// Derive the relative path of an original payload.
pub fn derive_path(date: NaiveDate, checksum: &str, extension: Option<&str>) -> String {
    let prefix = format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day());
    match extension {
        Some(ext) if !ext.is_empty() => format!("{}/{}.{}", prefix, checksum, ext),
        _ => format!("{}/{}", prefix, checksum),
    }
}

/// Sibling path for the derivative of `primary`, with its own extension.
pub fn derivative_path(primary: &str, extension: &str) -> String {
    let (dir, file) = match primary.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, primary),
    };
    let stem = file.split_once('.').map(|(stem, _)| stem).unwrap_or(file);
    let name = format!("{}{}.{}", stem, DERIVATIVE_SUFFIX, extension);
    match dir {
        Some(dir) => format!("{}/{}", dir, name),
        None => name,
    }
}

/// Reject paths that could escape the backend root.
pub fn validate_path(path: &str) -> StorageResult<()> {
    if path.is_empty() {
        return Err(StorageError::InvalidPath("path is empty".to_string()));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(StorageError::InvalidPath(format!(
            "{}: must be a relative path with '/' separators",
            path
        )));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidPath(format!(
            "{}: contains an empty or relative segment",
            path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn test_derive_path_is_date_partitioned() {
        assert_eq!(
            derive_path(day(), "fc5e038d38a57032085441e7fe7010b0", Some("txt")),
            "2026/03/07/fc5e038d38a57032085441e7fe7010b0.txt"
        );
        assert_eq!(derive_path(day(), "abc", None), "2026/03/07/abc");
    }

    #[test]
    fn test_derivative_path_is_sibling() {
        assert_eq!(
            derivative_path("2026/03/07/abc.png", "jpg"),
            "2026/03/07/abc_thumb.jpg"
        );
        assert_eq!(derivative_path("abc", "png"), "abc_thumb.png");
    }

    #[test]
    fn test_validate_path_rejects_traversal() {
        assert!(validate_path("2026/03/07/abc.png").is_ok());
        for bad in ["", "/etc/passwd", "../x", "a/../b", "a//b", "a\\b", "./a"] {
            assert!(
                matches!(validate_path(bad), Err(StorageError::InvalidPath(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }
}
