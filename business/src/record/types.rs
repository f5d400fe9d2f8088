//! Document store types.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::file_item::FileHandle;

/// Value of `status` on every record this crate writes.
pub const RECORD_STATUS_COMPLETED: &str = "completed";

/// Placeholder the store replaces with its own clock on write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerTimestamp;

impl Serialize for ServerTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(".sv", "timestamp")?;
        map.end()
    }
}

/// Metadata document written once per successfully hosted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub external_url: String,
    pub uploaded_by: String,
    pub uploaded_at: ServerTimestamp,
    pub status: &'static str,
    pub thumbnail_url: Option<String>,
}

impl FileRecord {
    pub fn new(
        id: impl Into<String>,
        handle: &FileHandle,
        external_url: impl Into<String>,
        uploaded_by: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: handle.name().to_owned(),
            mime_type: handle.mime_type().to_owned(),
            size: handle.size(),
            external_url: external_url.into(),
            uploaded_by: uploaded_by.into(),
            uploaded_at: ServerTimestamp,
            status: RECORD_STATUS_COMPLETED,
            thumbnail_url: handle.thumbnail_url().map(str::to_owned),
        }
    }
}

/// A record as the store keeps it, with the timestamp resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub record: FileRecord,
    pub uploaded_at: DateTime<Utc>,
}

/// Error type for document store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("store responded with status {0}")]
    Status(u16),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("invalid record: {0}")]
    Encode(String),
}
