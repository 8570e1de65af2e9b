//! In-flight transfer unit handed to the coordinator for one upload call.

use bytes::Bytes;
use std::path::{Path, PathBuf};

/// An upload request. The unit owns its payload for the duration of the call
/// and is discarded once the coordinator returns.
#[derive(Debug, Clone)]
pub struct FileTransferUnit {
    pub file_name: String,
    pub payload: Bytes,
    pub declared_type: String,
    pub size_bytes: i64,
    /// Caller-declared MD5; verified against the computed checksum when set.
    pub checksum: Option<String>,
    pub source_path: Option<PathBuf>,
    pub result_url: Option<String>,
    pub relative_path: Option<String>,
}

impl FileTransferUnit {
    pub fn new(
        file_name: impl Into<String>,
        declared_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        let payload = payload.into();
        Self {
            file_name: file_name.into(),
            size_bytes: payload.len() as i64,
            payload,
            declared_type: declared_type.into(),
            checksum: None,
            source_path: None,
            result_url: None,
            relative_path: None,
        }
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// Build a unit by reading `path` from disk. The content type is guessed
    /// from the extension when not given.
    pub async fn from_path(
        path: impl AsRef<Path>,
        declared_type: Option<&str>,
    ) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let declared_type = declared_type
            .map(String::from)
            .unwrap_or_else(|| guess_content_type(&file_name).to_string());
        let mut unit = Self::new(file_name, declared_type, data);
        unit.source_path = Some(path.to_path_buf());
        Ok(unit)
    }

    /// Lowercased extension of the original file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.file_name)
    }

    /// Whether the declared content type is an image.
    pub fn is_image(&self) -> bool {
        self.declared_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
}

pub fn guess_content_type(file_name: &str) -> &'static str {
    match extension_of(file_name).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_size_from_payload() {
        let unit = FileTransferUnit::new("hello.txt", "text/plain", b"helloworld".to_vec());
        assert_eq!(unit.size_bytes, 10);
        assert_eq!(unit.extension().as_deref(), Some("txt"));
        assert!(!unit.is_image());
    }

    #[test]
    fn test_extension_rejects_odd_suffixes() {
        assert_eq!(extension_of("archive.TAR"), Some("tar".into()));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("weird.p/ng"), None);
    }

    #[test]
    fn test_is_image_is_case_insensitive() {
        let unit = FileTransferUnit::new("a.png", "Image/PNG", vec![1u8]);
        assert!(unit.is_image());
    }

    #[tokio::test]
    async fn test_from_path_guesses_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.JPG");
        tokio::fs::write(&path, b"jpegish").await.unwrap();

        let unit = FileTransferUnit::from_path(&path, None).await.unwrap();
        assert_eq!(unit.file_name, "photo.JPG");
        assert_eq!(unit.declared_type, "image/jpeg");
        assert_eq!(unit.size_bytes, 7);
        assert_eq!(unit.source_path.as_deref(), Some(path.as_path()));
    }
}
