//! Upload pipeline of the file picker.
//!
//! Picked files flow through [`UploadOrchestrator`], which runs the
//! [`HostingTransport`] and then the [`MetadataRecorder`] for each of them
//! with bounded concurrency. The merged stream of [`BatchUpdate`]s drives
//! both the [`UploadNotifier`] and the [`BatchState`] reconciler owned by
//! [`FilePickerModel`].

mod auth_state;
mod config;
mod error;
mod file_item;
mod http;
mod notification;
mod orchestrator;
mod reconciler;
mod record;
mod spool;
mod transport;

#[cfg(test)]
mod test_utils;

pub use auth_state::{AuthSession, AuthStatus, Credentials};
pub use config::{BusinessConfig, ConfigError, ENV_PREFIX};
pub use error::UploadError;
pub use file_item::{
    FileHandle, FileKind, Locator, MAX_FILE_SIZE, Selection, UploadState, extension_of,
    format_size,
};
pub use http::{Client, HttpError, HttpResult, Method, RequestBuilder, Response};
pub use notification::{
    DEFAULT_NOTIFICATION_BODY, DEFAULT_NOTIFICATION_TITLE, GENERAL_NOTIFICATION_ID,
    LogNotificationSink, MemoryNotificationSink, NotificationData, NotificationSink, SinkCall,
    UPLOAD_PROGRESS_NOTIFICATION_ID, UploadNotifier, UploadProgressNotification,
};
pub use orchestrator::{BatchRun, BatchUpdate, UploadOrchestrator};
pub use reconciler::{BatchCanceller, BatchState, FilePickerModel};
pub use record::{
    ConfiguredStore, DocumentStore, FileRecord, MetadataRecorder, MockDocumentStore,
    RECORD_STATUS_COMPLETED, RECORDING_WATERMARK, RestDocumentStore, ServerTimestamp, StoreError,
    StoredRecord,
};
pub use spool::{ContentResolver, FsContentResolver, SpoolFile};
pub use transport::{
    ACCEPTED_WATERMARK, FILE_FIELD, FileIoTransport, HostingTransport, REQUEST_READY_WATERMARK,
    SPOOLED_WATERMARK, parse_hosting_response,
};
