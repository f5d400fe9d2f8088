//! Error taxonomy of the upload pipeline.
//!
//! Per-file errors never cross the orchestrator boundary as `Err`: they
//! are rendered into the message of a `Failed` [`FileHandle`]. Only
//! [`UploadError::StreamInfrastructure`] is surfaced to the reconciler as
//! a stream-level failure.
//!
//! [`FileHandle`]: crate::FileHandle

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Local validation failed before any I/O.
    #[error("File size exceeds {limit_label} limit")]
    SizeLimitExceeded { size: u64, limit_label: String },

    /// Network or local I/O fault while uploading.
    #[error("Upload failed: {0}")]
    Transport(String),

    /// The hosting endpoint answered 2xx with a body we could not read.
    #[error("Failed to parse upload response")]
    ResponseParse,

    /// The hosting endpoint answered with a non-2xx status.
    #[error("Upload failed with code: {0}")]
    HttpStatus(u16),

    #[error("User not authenticated")]
    AuthenticationRequired,

    /// The document store rejected the metadata write.
    #[error("Failed to save file metadata: {0}")]
    RecordWrite(String),

    /// Fault in the orchestration layer, not attributable to one file.
    #[error("Upload pipeline failed: {0}")]
    StreamInfrastructure(String),
}

impl UploadError {
    pub fn size_limit(size: u64, limit: u64) -> Self {
        Self::SizeLimitExceeded {
            size,
            limit_label: limit_label(limit),
        }
    }

    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    pub fn record_write(cause: impl std::fmt::Display) -> Self {
        Self::RecordWrite(cause.to_string())
    }

    pub fn infrastructure(cause: impl std::fmt::Display) -> Self {
        Self::StreamInfrastructure(cause.to_string())
    }
}

/// `2 GiB` renders as `"2GB"`, anything smaller than a GiB as bytes.
fn limit_label(limit: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    if limit >= GB && limit % GB == 0 {
        format!("{}GB", limit / GB)
    } else {
        format!("{limit} bytes")
    }
}
