use filepicker_business::{
    AuthSession, BatchState, BusinessConfig, Client, FileIoTransport, FilePickerModel,
    FsContentResolver, Locator, MemoryNotificationSink, MetadataRecorder, MockDocumentStore,
    Selection, UploadNotifier, UploadOrchestrator,
};
use filepicker_states::{StateReader, state_channel};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub type TestModel = FilePickerModel<FileIoTransport, MockDocumentStore, MemoryNotificationSink>;

pub struct TestCtx {
    pub mock_server: MockServer,
    pub source_dir: TempDir,
    pub spool_dir: TempDir,
    pub store: MockDocumentStore,
    pub session: AuthSession,
    pub sink: MemoryNotificationSink,
    pub reader: StateReader<BatchState>,
    pub model: TestModel,
}

impl TestCtx {
    pub async fn new() -> Self {
        let mock_server = MockServer::start().await;
        let source_dir = tempfile::tempdir().unwrap();
        let spool_dir = tempfile::tempdir().unwrap();
        let store = MockDocumentStore::new();
        let session = AuthSession::authenticated("user-1", "token-1");
        let sink = MemoryNotificationSink::new();

        let config = BusinessConfig::new(format!("{}/", mock_server.uri()))
            .with_spool_dir(spool_dir.path());
        let transport = FileIoTransport::new(&config, Client::default(), FsContentResolver);
        let recorder = MetadataRecorder::new(store.clone(), session.clone(), "files");
        let orchestrator = UploadOrchestrator::new(&config, transport, recorder);
        let (updater, reader) = state_channel();
        let model = FilePickerModel::new(orchestrator, UploadNotifier::new(sink.clone()), updater);

        Self {
            mock_server,
            source_dir,
            spool_dir,
            store,
            session,
            sink,
            reader,
            model,
        }
    }

    /// Writes a source file of `size` bytes and returns its selection.
    pub fn select(&self, name: &str, size: usize) -> Selection {
        let path = self.source_dir.path().join(name);
        std::fs::write(&path, vec![b'x'; size]).unwrap();
        Selection::new(Locator::from_path(&path), name, "text/plain", size as u64)
    }

    /// Answers every upload with a file.io success body linking to `key`.
    pub async fn mount_success(&self, key: &str) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(success_body(key)))
            .mount(&self.mock_server)
            .await;
    }

    /// Answers uploads of `file_name` with `status` and `body`.
    #[allow(unused)]
    pub async fn mount_for_file(&self, file_name: &str, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(body_string_contains(format!("filename=\"{file_name}\"")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.mock_server)
            .await;
    }

    pub fn spool_entries(&self) -> usize {
        std::fs::read_dir(self.spool_dir.path()).unwrap().count()
    }

    #[allow(unused)]
    pub async fn received_uploads(&self) -> usize {
        self.mock_server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }
}

pub fn success_body(key: &str) -> String {
    format!(r#"{{"success":true,"key":"{key}","link":"https://file.io/{key}"}}"#)
}
