//! Runs the transport and recorder for every file of a batch.
//!
//! Each file gets a strictly ordered pipeline (transport, then recorder);
//! pipelines of different files interleave freely, but no more than
//! `max_concurrent_uploads` of them are active at once.

use std::path::PathBuf;
use std::sync::Arc;

use async_stream::stream;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, pin_mut};
use log::{error, info};

use filepicker_states::{TaskHandle, TaskIdGenerator};

use crate::auth_state::AuthSession;
use crate::config::BusinessConfig;
use crate::error::UploadError;
use crate::file_item::{FileHandle, UploadState};
use crate::http::{Client, HttpResult};
use crate::record::{ConfiguredStore, DocumentStore, MetadataRecorder};
use crate::spool::FsContentResolver;
use crate::transport::{FileIoTransport, HostingTransport};

const BATCH_TASK_LABEL: &str = "upload_batch";

/// One forwarded event plus the current state of every batch member.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchUpdate {
    pub event: FileHandle,
    /// Batch members in selection order; `Pending` until they report.
    pub snapshot: Vec<FileHandle>,
}

/// A started batch: its cancellation handle and its update stream.
pub struct BatchRun {
    pub task: TaskHandle,
    pub updates: BoxStream<'static, Result<BatchUpdate, UploadError>>,
}

#[derive(Debug, Clone)]
pub struct UploadOrchestrator<T = FileIoTransport, S = ConfiguredStore> {
    transport: T,
    recorder: MetadataRecorder<S>,
    max_concurrent_uploads: usize,
    spool_dir: PathBuf,
    task_ids: Arc<TaskIdGenerator>,
}

impl UploadOrchestrator {
    /// Wires the file.io transport and the configured document store.
    pub fn from_config(config: &BusinessConfig, session: AuthSession) -> HttpResult<Self> {
        let client = Client::new(config.request_timeout)?;
        let transport = FileIoTransport::new(config, client.clone(), FsContentResolver);
        let store = ConfiguredStore::from_config(config, client);
        let recorder = MetadataRecorder::new(store, session, config.store_collection.as_str());
        Ok(Self::new(config, transport, recorder))
    }
}

impl<T, S> UploadOrchestrator<T, S>
where
    T: HostingTransport,
    S: DocumentStore,
{
    pub fn new(config: &BusinessConfig, transport: T, recorder: MetadataRecorder<S>) -> Self {
        Self {
            transport,
            recorder,
            max_concurrent_uploads: config.max_concurrent_uploads.max(1),
            spool_dir: config.spool_dir.clone(),
            task_ids: Arc::new(TaskIdGenerator::default()),
        }
    }

    pub fn recorder(&self) -> &MetadataRecorder<S> {
        &self.recorder
    }

    /// Transport events followed by recorder events for one file.
    ///
    /// The transport's `Completed` event is not forwarded; it is handed to
    /// the recorder, whose events take its place.
    pub fn upload_one(&self, handle: FileHandle) -> BoxStream<'static, FileHandle> {
        let recorder = self.recorder.clone();
        self.transport
            .upload(handle)
            .flat_map(move |event| match event.upload_state() {
                UploadState::Completed => {
                    let url = event.upload_url().unwrap_or_default().to_owned();
                    recorder.record(event, url)
                }
                _ => stream::once(async move { event }).boxed(),
            })
            .boxed()
    }

    /// Uploads `handles` and returns the merged update stream.
    ///
    /// Dropping the stream cancels every in-flight pipeline.
    pub fn upload_batch(
        &self,
        handles: Vec<FileHandle>,
    ) -> BoxStream<'static, Result<BatchUpdate, UploadError>> {
        self.start_batch(handles).updates
    }

    /// Like [`Self::upload_batch`], also returning a handle that ends the
    /// stream when cancelled.
    pub fn start_batch(&self, handles: Vec<FileHandle>) -> BatchRun {
        let task = TaskHandle::new(self.task_ids.next(BATCH_TASK_LABEL));
        let cancelled = task.cancellation_token().cancelled_owned();
        let this = self.clone();
        let task_id = task.id();

        let updates = stream! {
            if let Err(e) = tokio::fs::create_dir_all(&this.spool_dir).await {
                error!("Cannot prepare spool directory {}: {}", this.spool_dir.display(), e);
                yield Err(UploadError::infrastructure(format!(
                    "cannot prepare spool directory {}: {e}",
                    this.spool_dir.display()
                )));
                return;
            }

            info!("Starting {} with {} file(s)", task_id, handles.len());
            let mut snapshot = handles.clone();
            let pipelines: Vec<_> = handles
                .into_iter()
                .map(|handle| this.upload_one(handle))
                .collect();
            let events = stream::iter(pipelines).flatten_unordered(this.max_concurrent_uploads);
            pin_mut!(events);

            while let Some(event) = events.next().await {
                if let Some(slot) = snapshot
                    .iter_mut()
                    .find(|member| member.correlation_key() == event.correlation_key())
                {
                    *slot = event.clone();
                }
                yield Ok(BatchUpdate {
                    event,
                    snapshot: snapshot.clone(),
                });
            }
            info!("Finished {}", task_id);
        };

        BatchRun {
            task,
            updates: updates.take_until(cancelled).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_item::Locator;
    use crate::record::MockDocumentStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Completes every upload after a short delay while tracking how many
    /// uploads run at once.
    #[derive(Clone, Default)]
    struct CountingTransport {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        started: Arc<AtomicUsize>,
    }

    impl HostingTransport for CountingTransport {
        fn upload(&self, handle: FileHandle) -> BoxStream<'static, FileHandle> {
            let this = self.clone();
            Box::pin(stream! {
                this.started.fetch_add(1, Ordering::SeqCst);
                let now = this.active.fetch_add(1, Ordering::SeqCst) + 1;
                this.peak.fetch_max(now, Ordering::SeqCst);
                yield handle.uploading(0.1);
                tokio::time::sleep(Duration::from_millis(20)).await;
                this.active.fetch_sub(1, Ordering::SeqCst);
                yield handle.completed(format!("https://file.io/{}", handle.name()));
            })
        }
    }

    fn handles(count: usize) -> Vec<FileHandle> {
        (0..count)
            .map(|i| {
                FileHandle::new(
                    format!("sel-{i}"),
                    format!("f{i}.txt"),
                    Locator::new(format!("/f{i}.txt")),
                    "text/plain",
                    10,
                )
            })
            .collect()
    }

    fn orchestrator(
        config: &BusinessConfig,
        transport: CountingTransport,
        store: MockDocumentStore,
    ) -> UploadOrchestrator<CountingTransport, MockDocumentStore> {
        let recorder = MetadataRecorder::new(store, AuthSession::authenticated("u1", "t1"), "files");
        UploadOrchestrator::new(config, transport, recorder)
    }

    fn config(spool: &tempfile::TempDir) -> BusinessConfig {
        BusinessConfig::default().with_spool_dir(spool.path())
    }

    #[tokio::test]
    async fn test_upload_one_replaces_transport_completion_with_record() {
        let spool = tempfile::tempdir().unwrap();
        let store = MockDocumentStore::new();
        let orchestrator = orchestrator(&config(&spool), CountingTransport::default(), store.clone());

        let events: Vec<FileHandle> = orchestrator.upload_one(handles(1).remove(0)).collect().await;

        let progress: Vec<f32> = events.iter().map(FileHandle::upload_progress).collect();
        assert_eq!(progress, vec![0.1, 0.5, 1.0]);
        let last = events.last().unwrap();
        assert!(last.is_completed());
        assert_eq!(last.upload_url(), Some("https://file.io/f0.txt"));
        assert_ne!(last.id(), "sel-0");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_never_exceeds_concurrency_limit() {
        let spool = tempfile::tempdir().unwrap();
        let transport = CountingTransport::default();
        let orchestrator = orchestrator(&config(&spool), transport.clone(), MockDocumentStore::new());

        let updates: Vec<_> = orchestrator.upload_batch(handles(5)).collect().await;

        assert_eq!(transport.started.load(Ordering::SeqCst), 5);
        assert_eq!(transport.peak.load(Ordering::SeqCst), 3);
        // 0.1, 0.5 and 1.0 per file.
        assert_eq!(updates.len(), 15);
        let last = updates.last().unwrap().as_ref().unwrap();
        assert!(last.snapshot.iter().all(FileHandle::is_completed));
    }

    #[tokio::test]
    async fn test_limit_of_one_serializes_pipelines() {
        let spool = tempfile::tempdir().unwrap();
        let transport = CountingTransport::default();
        let config = config(&spool).with_max_concurrent_uploads(1);
        let orchestrator = orchestrator(&config, transport.clone(), MockDocumentStore::new());

        let _: Vec<_> = orchestrator.upload_batch(handles(3)).collect().await;
        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_snapshot_keeps_selection_order_and_pending_members() {
        let spool = tempfile::tempdir().unwrap();
        let config = config(&spool).with_max_concurrent_uploads(1);
        let orchestrator =
            orchestrator(&config, CountingTransport::default(), MockDocumentStore::new());

        let mut updates = orchestrator.upload_batch(handles(2));
        let first = updates.next().await.unwrap().unwrap();

        assert_eq!(first.event.correlation_key(), "sel-0");
        let keys: Vec<&str> = first.snapshot.iter().map(FileHandle::correlation_key).collect();
        assert_eq!(keys, vec!["sel-0", "sel-1"]);
        assert!(first.snapshot[0].is_uploading());
        assert!(first.snapshot[1].is_pending());
    }

    #[tokio::test]
    async fn test_per_file_order_is_preserved() {
        let spool = tempfile::tempdir().unwrap();
        let orchestrator =
            orchestrator(&config(&spool), CountingTransport::default(), MockDocumentStore::new());

        let updates: Vec<_> = orchestrator.upload_batch(handles(4)).collect().await;

        for key in ["sel-0", "sel-1", "sel-2", "sel-3"] {
            let progress: Vec<f32> = updates
                .iter()
                .map(|u| &u.as_ref().unwrap().event)
                .filter(|e| e.correlation_key() == key)
                .map(FileHandle::upload_progress)
                .collect();
            assert_eq!(progress, vec![0.1, 0.5, 1.0], "file {key}");
        }
    }

    #[tokio::test]
    async fn test_unusable_spool_dir_is_a_stream_error() {
        let spool = tempfile::tempdir().unwrap();
        let blocker = spool.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let config = BusinessConfig::default().with_spool_dir(blocker.join("spool"));
        let transport = CountingTransport::default();
        let orchestrator = orchestrator(&config, transport.clone(), MockDocumentStore::new());

        let updates: Vec<_> = orchestrator.upload_batch(handles(2)).collect().await;

        assert_eq!(updates.len(), 1);
        let err = updates[0].as_ref().unwrap_err();
        assert!(matches!(err, UploadError::StreamInfrastructure(_)));
        assert_eq!(transport.started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelling_the_task_ends_the_stream() {
        let spool = tempfile::tempdir().unwrap();
        let transport = CountingTransport::default();
        let orchestrator = orchestrator(&config(&spool), transport.clone(), MockDocumentStore::new());

        let BatchRun { task, mut updates } = orchestrator.start_batch(handles(5));
        assert!(updates.next().await.is_some());
        task.cancel();

        assert!(updates.next().await.is_none());
        assert!(transport.started.load(Ordering::SeqCst) <= 3);
    }
}
