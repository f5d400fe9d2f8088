//! Notification side effects of an upload batch.
//!
//! [`UploadNotifier`] watches the same [`BatchUpdate`] stream the
//! reconciler consumes and turns it into calls on a [`NotificationSink`].
//! It keeps no state between updates.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::info;
use serde::{Deserialize, Serialize};

use crate::orchestrator::BatchUpdate;

/// Shared by every progress notification so a new one replaces the last.
pub const UPLOAD_PROGRESS_NOTIFICATION_ID: u32 = 1001;
pub const GENERAL_NOTIFICATION_ID: u32 = 1002;

pub const DEFAULT_NOTIFICATION_TITLE: &str = "File Picker";
pub const DEFAULT_NOTIFICATION_BODY: &str = "You have a new message";

/// A general notification, either local or delivered by push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub title: String,
    pub body: String,
    pub image_url: Option<String>,
    pub action_url: Option<String>,
    /// Raw key/value payload the notification was built from.
    pub data: HashMap<String, String>,
}

impl NotificationData {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Builds a notification from a push data payload.
    ///
    /// Reads `title`, `body`, `image_url` and `action_url`; missing title
    /// and body fall back to generic text. The whole payload is kept in
    /// [`NotificationData::data`].
    pub fn from_data_payload(data: HashMap<String, String>) -> Self {
        Self {
            title: data
                .get("title")
                .cloned()
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_owned()),
            body: data
                .get("body")
                .cloned()
                .unwrap_or_else(|| DEFAULT_NOTIFICATION_BODY.to_owned()),
            image_url: data.get("image_url").cloned(),
            action_url: data.get("action_url").cloned(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgressNotification {
    pub file_name: String,
    /// 0 to 100.
    pub progress: u8,
    pub is_completed: bool,
}

impl UploadProgressNotification {
    pub fn new(file_name: impl Into<String>, progress: u8, is_completed: bool) -> Self {
        Self {
            file_name: file_name.into(),
            progress: progress.min(100),
            is_completed,
        }
    }

    pub fn title(&self) -> &'static str {
        if self.is_completed {
            "Upload Complete"
        } else {
            "Uploading Files"
        }
    }

    pub fn text(&self) -> String {
        if self.is_completed {
            format!("{} uploaded successfully", self.file_name)
        } else {
            format!("Uploading {}...", self.file_name)
        }
    }
}

/// Host facility that displays notifications.
pub trait NotificationSink: Send + Sync + 'static {
    fn show_notification(&self, notification: NotificationData);

    /// Shows or replaces the single upload progress notification.
    fn show_upload_progress(&self, progress: UploadProgressNotification);

    fn cancel_upload_progress(&self);
}

/// Writes notifications to the log instead of displaying them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn show_notification(&self, notification: NotificationData) {
        info!(
            "[notification {}] {}: {}",
            GENERAL_NOTIFICATION_ID, notification.title, notification.body
        );
    }

    fn show_upload_progress(&self, progress: UploadProgressNotification) {
        info!(
            "[notification {}] {}: {} ({}%)",
            UPLOAD_PROGRESS_NOTIFICATION_ID,
            progress.title(),
            progress.text(),
            progress.progress
        );
    }

    fn cancel_upload_progress(&self) {
        info!("[notification {}] cancelled", UPLOAD_PROGRESS_NOTIFICATION_ID);
    }
}

/// A call received by a [`MemoryNotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    General(NotificationData),
    Progress(UploadProgressNotification),
    CancelProgress,
}

/// Keeps every call in memory, for hosts without a display and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationSink {
    calls: Arc<RwLock<Vec<SinkCall>>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, call: SinkCall) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl NotificationSink for MemoryNotificationSink {
    fn show_notification(&self, notification: NotificationData) {
        self.push(SinkCall::General(notification));
    }

    fn show_upload_progress(&self, progress: UploadProgressNotification) {
        self.push(SinkCall::Progress(progress));
    }

    fn cancel_upload_progress(&self) {
        self.push(SinkCall::CancelProgress);
    }
}

/// Maps batch updates to notification calls.
///
/// The progress notification follows the first member still uploading and
/// is cancelled once no member is pending or uploading.
#[derive(Debug, Clone)]
pub struct UploadNotifier<N> {
    sink: N,
}

impl<N: NotificationSink> UploadNotifier<N> {
    pub fn new(sink: N) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn observe(&self, update: &BatchUpdate) {
        let event = &update.event;

        if event.is_failed() {
            let message = event.error_message().unwrap_or_default();
            self.sink.show_notification(NotificationData::new(
                "Upload Failed",
                format!("Failed to upload {}: {}", event.name(), message),
            ));
        } else if event.is_completed() {
            self.sink
                .show_upload_progress(UploadProgressNotification::new(event.name(), 100, true));
        } else if let Some(active) = update.snapshot.iter().find(|file| {
            file.is_uploading() && file.upload_progress() > 0.0 && file.upload_progress() < 1.0
        }) {
            self.sink.show_upload_progress(UploadProgressNotification::new(
                active.name(),
                active.progress_percent(),
                false,
            ));
        }

        let settled = update
            .snapshot
            .iter()
            .all(|file| !file.is_pending() && !file.is_uploading());
        if !update.snapshot.is_empty() && settled {
            self.sink.cancel_upload_progress();
        }
    }
}
