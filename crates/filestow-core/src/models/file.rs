//! File record model: durable metadata about one stored payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a file record.
///
/// `Active -> Trashed -> Active` via soft delete and restore; any state may
/// move to `Purged` through a permanent delete. `Purged` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Active,
    Trashed,
    Purged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    pub storage_key: String,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Lowercase hex MD5 of the stored payload.
    pub checksum: String,
    pub primary_path: String,
    pub derivative_path: Option<String>,
    pub in_trash: bool,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub purged_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    pub fn state(&self) -> FileState {
        if self.purged_at.is_some() {
            FileState::Purged
        } else if self.in_trash {
            FileState::Trashed
        } else {
            FileState::Active
        }
    }

    /// Every stored path owned by this record, primary first.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_path.as_str()).chain(self.derivative_path.as_deref())
    }
}

/// Partial update applied by `FileRecordStore::update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRecordPatch {
    pub in_trash: Option<bool>,
    pub deleted_at: Option<Option<DateTime<Utc>>>,
    pub purged_at: Option<DateTime<Utc>>,
}

impl FileRecordPatch {
    pub fn trashed(at: DateTime<Utc>) -> Self {
        Self {
            in_trash: Some(true),
            deleted_at: Some(Some(at)),
            purged_at: None,
        }
    }

    pub fn restored() -> Self {
        Self {
            in_trash: Some(false),
            deleted_at: Some(None),
            purged_at: None,
        }
    }

    pub fn purged(at: DateTime<Utc>) -> Self {
        Self {
            in_trash: Some(false),
            deleted_at: Some(Some(at)),
            purged_at: Some(at),
        }
    }

    pub fn apply(&self, record: &mut FileRecord) {
        if let Some(in_trash) = self.in_trash {
            record.in_trash = in_trash;
        }
        if let Some(deleted_at) = self.deleted_at {
            record.deleted_at = deleted_at;
        }
        if let Some(purged_at) = self.purged_at {
            record.purged_at = Some(purged_at);
        }
    }
}
