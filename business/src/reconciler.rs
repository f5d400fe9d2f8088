//! Client-side view of the files being picked and uploaded.
//!
//! [`BatchState`] is the authoritative list the UI renders. It changes only
//! through [`BatchState::apply`] and [`BatchState::fail`] while a batch is
//! running, and through the [`FilePickerModel`] actions otherwise. Every
//! change is published to a [`StateReader`](filepicker_states::StateReader).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use log::{debug, error, info, warn};

use filepicker_states::{State, StateUpdater, TaskHandle};

use crate::error::UploadError;
use crate::file_item::{FileHandle, Selection, UploadState};
use crate::notification::{NotificationSink, UploadNotifier};
use crate::orchestrator::{BatchRun, UploadOrchestrator};
use crate::record::DocumentStore;
use crate::transport::HostingTransport;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchState {
    /// Files picked and not yet fully uploaded, in selection order.
    pub selected_files: Vec<FileHandle>,
    /// Files of the last batch that finished with every member completed.
    pub uploaded_files: Vec<FileHandle>,
    pub is_uploading: bool,
    /// Batch-level failure message.
    pub error_message: Option<String>,
}

impl State for BatchState {
    const TYPE: &'static str = "batch_state";
}

impl BatchState {
    pub fn has_selected_files(&self) -> bool {
        !self.selected_files.is_empty()
    }

    pub fn can_upload(&self) -> bool {
        self.has_selected_files() && !self.is_uploading
    }

    /// Mean progress over the selected files, `0.0` when there are none.
    pub fn upload_progress(&self) -> f32 {
        if self.selected_files.is_empty() {
            return 0.0;
        }
        let total: f32 = self
            .selected_files
            .iter()
            .map(FileHandle::upload_progress)
            .sum();
        total / self.selected_files.len() as f32
    }

    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Merges a batch of incoming handle events into the selection.
    ///
    /// Events are grouped by correlation key and the one with the highest
    /// progress wins. On equal progress the later event wins, unlike a
    /// first-wins maximum, so a `Failed` event replaces the `Uploading`
    /// event it shares a watermark with. A winner at
    /// full progress that still reads `Uploading` is treated as
    /// `Completed`. When every incoming event is `Completed`, the completed
    /// selection replaces [`BatchState::uploaded_files`].
    pub fn apply(&mut self, incoming: &[FileHandle]) {
        if incoming.is_empty() {
            return;
        }

        let mut picks: HashMap<&str, &FileHandle> = HashMap::new();
        for event in incoming {
            let key = event.correlation_key();
            let replace = picks
                .get(key)
                .is_none_or(|current| event.upload_progress() >= current.upload_progress());
            if replace {
                picks.insert(key, event);
            }
        }

        for selected in &mut self.selected_files {
            if let Some(pick) = picks.get(selected.correlation_key()) {
                *selected = if pick.upload_progress() >= 1.0
                    && pick.upload_state() == UploadState::Uploading
                {
                    pick.promoted()
                } else {
                    (*pick).clone()
                };
            }
        }

        self.is_uploading = self.selected_files.iter().any(FileHandle::is_uploading);

        if incoming.iter().all(FileHandle::is_completed) {
            let (done, rest): (Vec<_>, Vec<_>) = self
                .selected_files
                .drain(..)
                .partition(FileHandle::is_completed);
            info!("Batch complete, {} file(s) uploaded", done.len());
            self.uploaded_files = done;
            self.selected_files = rest;
            self.is_uploading = false;
        }
    }

    /// Moves every `Uploading` selected file back to `Pending` and returns
    /// how many moved.
    pub fn release_unfinished(&mut self) -> usize {
        let mut released = 0;
        for file in &mut self.selected_files {
            if file.is_uploading() {
                *file = file.reset();
                released += 1;
            }
        }
        if released > 0 {
            debug!("Released {} unfinished file(s)", released);
        }
        self.is_uploading = false;
        released
    }

    /// Records a batch-level failure. File states are left as they are.
    pub fn fail(&mut self, err: &UploadError) {
        self.error_message = Some(err.to_string());
        self.is_uploading = false;
    }
}

/// Cancels whichever batch a [`FilePickerModel`] is currently running.
#[derive(Debug, Clone, Default)]
pub struct BatchCanceller {
    current: Arc<Mutex<Option<TaskHandle>>>,
}

impl BatchCanceller {
    /// Returns false when no batch was running.
    pub fn cancel(&self) -> bool {
        match self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(task) => {
                info!("Cancelling {}", task.id());
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn set(&self, task: Option<TaskHandle>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = task;
    }
}

/// View-model owning the [`BatchState`] of one picker screen.
pub struct FilePickerModel<T, S, N> {
    orchestrator: UploadOrchestrator<T, S>,
    notifier: UploadNotifier<N>,
    state: BatchState,
    updater: StateUpdater<BatchState>,
    canceller: BatchCanceller,
}

impl<T, S, N> FilePickerModel<T, S, N>
where
    T: HostingTransport,
    S: DocumentStore,
    N: NotificationSink,
{
    pub fn new(
        orchestrator: UploadOrchestrator<T, S>,
        notifier: UploadNotifier<N>,
        updater: StateUpdater<BatchState>,
    ) -> Self {
        Self {
            orchestrator,
            notifier,
            state: BatchState::default(),
            updater,
            canceller: BatchCanceller::default(),
        }
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    pub fn cancel_handle(&self) -> BatchCanceller {
        self.canceller.clone()
    }

    pub fn add_files(&mut self, selections: impl IntoIterator<Item = Selection>) {
        let before = self.state.selected_files.len();
        self.state
            .selected_files
            .extend(selections.into_iter().map(FileHandle::from_selection));
        debug!(
            "Added {} file(s)",
            self.state.selected_files.len() - before
        );
        self.publish();
    }

    pub fn remove_file(&mut self, id: &str) {
        let before = self.state.selected_files.len();
        self.state.selected_files.retain(|file| file.id() != id);
        if self.state.selected_files.len() != before {
            self.publish();
        }
    }

    pub fn clear_selected_files(&mut self) {
        self.state.selected_files.clear();
        self.publish();
    }

    pub fn clear_error(&mut self) {
        self.state.error_message = None;
        self.publish();
    }

    /// Uploads every `Pending` selected file and returns when the batch ends.
    ///
    /// Each update goes to the notifier and the reconciler, in that order.
    /// Files a cancelled batch left `Uploading` go back to `Pending`.
    pub async fn upload_files(&mut self) {
        if self.state.is_uploading {
            warn!("Upload already in progress");
            return;
        }

        let pending: Vec<FileHandle> = self
            .state
            .selected_files
            .iter()
            .filter(|file| file.is_pending())
            .cloned()
            .collect();
        if pending.is_empty() {
            debug!("Nothing to upload");
            return;
        }

        self.state.is_uploading = true;
        self.state.error_message = None;
        self.publish();

        let BatchRun { task, mut updates } = self.orchestrator.start_batch(pending);
        self.canceller.set(Some(task.clone()));

        while let Some(item) = updates.next().await {
            match item {
                Ok(update) => {
                    self.notifier.observe(&update);
                    self.state.apply(&update.snapshot);
                }
                Err(e) => {
                    error!("Upload batch failed: {}", e);
                    self.state.fail(&e);
                }
            }
            self.publish();
        }

        self.canceller.set(None);
        if task.is_cancelled() {
            info!("Upload batch {} cancelled", task.id());
        }
        let was_uploading = self.state.is_uploading;
        if self.state.release_unfinished() > 0 || was_uploading {
            self.publish();
        }
    }

    fn publish(&self) {
        self.updater.set(self.state.clone());
    }
}
