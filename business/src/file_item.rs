//! Files picked by the user and their upload lifecycle.
//!
//! A [`FileHandle`] is an immutable value. Every lifecycle transition
//! (`uploading`, `completed`, `failed`, ...) borrows the current handle and
//! returns a new one, so the reconciler and the notification observer can
//! hold the same event without ever seeing a half-updated copy.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest file the hosting endpoint accepts: 2 GiB.
pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Upload status of a single file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    Pending,
    Uploading,
    Completed,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to the bytes of a picked file.
///
/// The platform picker owns the underlying content; the pipeline only
/// keeps this reference and asks a `ContentResolver` to copy from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator(String);

impl Locator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the platform picker hands over for one chosen file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub locator: Locator,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

impl Selection {
    pub fn new(
        locator: Locator,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            locator,
            name: name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }
}

/// Coarse content category, derived from MIME type and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
    Document,
    Other,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "mov", "wmv", "flv"];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt",
];

impl FileKind {
    /// Image wins over video, video over document.
    pub fn classify(mime_type: &str, extension: &str) -> Self {
        if mime_type.starts_with("image/") || IMAGE_EXTENSIONS.contains(&extension) {
            Self::Image
        } else if mime_type.starts_with("video/") || VIDEO_EXTENSIONS.contains(&extension) {
            Self::Video
        } else if mime_type.starts_with("application/") || DOCUMENT_EXTENSIONS.contains(&extension)
        {
            Self::Document
        } else {
            Self::Other
        }
    }
}

/// Lowercase extension after the last `.` of `name`, empty when there is none.
pub fn extension_of(name: &str) -> String {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Human readable size using integer division, e.g. `"3 MB"`.
pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size < KB {
        format!("{size} B")
    } else if size < MB {
        format!("{} KB", size / KB)
    } else if size < GB {
        format!("{} MB", size / MB)
    } else {
        format!("{} GB", size / GB)
    }
}

/// A picked file moving through the upload pipeline.
///
/// Invariants kept by the transition methods:
/// - `Completed` iff an upload URL is present and progress is `1.0`
///   (the reconciler's promotion is the one documented exception).
/// - `Failed` iff an error message is present.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHandle {
    id: String,
    origin_id: String,
    name: String,
    locator: Locator,
    mime_type: String,
    size: u64,
    upload_progress: f32,
    upload_state: UploadState,
    upload_url: Option<String>,
    error_message: Option<String>,
    thumbnail_url: Option<String>,
}

impl FileHandle {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        locator: Locator,
        mime_type: impl Into<String>,
        size: u64,
    ) -> Self {
        let id = id.into();
        Self {
            origin_id: id.clone(),
            id,
            name: name.into(),
            locator,
            mime_type: mime_type.into(),
            size,
            upload_progress: 0.0,
            upload_state: UploadState::Pending,
            upload_url: None,
            error_message: None,
            thumbnail_url: None,
        }
    }

    /// A fresh `Pending` handle for a picker selection.
    pub fn from_selection(selection: Selection) -> Self {
        Self::new(
            Uuid::new_v4().to_string(),
            selection.name,
            selection.locator,
            selection.mime_type,
            selection.size,
        )
    }

    pub fn with_thumbnail_url(&self, url: impl Into<String>) -> Self {
        Self {
            thumbnail_url: Some(url.into()),
            ..self.clone()
        }
    }

    /// Replaces the identity. The correlation key is left untouched.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    /// Moves to `Uploading` at `progress` (clamped to `[0, 1]`).
    pub fn uploading(&self, progress: f32) -> Self {
        Self {
            upload_progress: progress.clamp(0.0, 1.0),
            upload_state: UploadState::Uploading,
            upload_url: None,
            error_message: None,
            ..self.clone()
        }
    }

    /// Back to `Pending` at zero progress, ready to be uploaded again.
    pub fn reset(&self) -> Self {
        Self {
            upload_progress: 0.0,
            upload_state: UploadState::Pending,
            upload_url: None,
            error_message: None,
            ..self.clone()
        }
    }

    pub fn completed(&self, url: impl Into<String>) -> Self {
        Self {
            upload_progress: 1.0,
            upload_state: UploadState::Completed,
            upload_url: Some(url.into()),
            error_message: None,
            ..self.clone()
        }
    }

    /// Moves to `Failed`, keeping the progress reached so far.
    pub fn failed(&self, message: impl Into<String>) -> Self {
        Self {
            upload_state: UploadState::Failed,
            upload_url: None,
            error_message: Some(message.into()),
            ..self.clone()
        }
    }

    /// Marks a fully progressed `Uploading` handle as `Completed`.
    pub(crate) fn promoted(&self) -> Self {
        Self {
            upload_progress: 1.0,
            upload_state: UploadState::Completed,
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Selection-time identity, stable across both pipeline stages.
    pub fn origin_id(&self) -> &str {
        &self.origin_id
    }

    /// Key used to match pipeline events back to the selected file.
    pub fn correlation_key(&self) -> &str {
        &self.origin_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn upload_progress(&self) -> f32 {
        self.upload_progress
    }

    /// Progress as a whole percentage in `0..=100`.
    pub fn progress_percent(&self) -> u8 {
        (self.upload_progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }

    pub fn upload_state(&self) -> UploadState {
        self.upload_state
    }

    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.thumbnail_url.as_deref()
    }

    pub fn is_completed(&self) -> bool {
        self.upload_state == UploadState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.upload_state == UploadState::Failed
    }

    pub fn is_uploading(&self) -> bool {
        self.upload_state == UploadState::Uploading
    }

    pub fn is_pending(&self) -> bool {
        self.upload_state == UploadState::Pending
    }

    pub fn extension(&self) -> String {
        extension_of(&self.name)
    }

    pub fn kind(&self) -> FileKind {
        FileKind::classify(&self.mime_type, &self.extension())
    }

    pub fn is_image(&self) -> bool {
        self.kind() == FileKind::Image
    }

    pub fn is_video(&self) -> bool {
        self.kind() == FileKind::Video
    }

    pub fn is_document(&self) -> bool {
        self.kind() == FileKind::Document
    }

    pub fn formatted_size(&self) -> String {
        format_size(self.size)
    }
}
