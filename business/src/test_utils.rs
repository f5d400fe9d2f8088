//! Test utilities for exercising the upload pipeline against a mock host.
//!
//! # Example
//!
//! ```ignore
//! let ctx = TestContext::new().await;
//! ctx.mount_upload_response(200, &file_io_success_body("k1")).await;
//!
//! let handle = ctx.source_file("a.txt", b"hello");
//! let events: Vec<FileHandle> = ctx.transport().upload(handle).collect().await;
//! assert!(events.last().unwrap().is_completed());
//! assert_eq!(ctx.spool_entries(), 0);
//! ```

#![cfg(test)]

use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::BusinessConfig;
use crate::file_item::{FileHandle, Locator, Selection};
use crate::http::Client;
use crate::spool::FsContentResolver;
use crate::transport::FileIoTransport;

/// Body file.io answers with on success.
pub fn file_io_success_body(key: &str) -> String {
    format!(
        r#"{{"success":true,"status":200,"key":"{key}","link":"https://file.io/{key}","expires":"2099-01-01T00:00:00.000Z"}}"#
    )
}

/// A mock hosting server plus private source and spool directories.
pub struct TestContext {
    pub mock_server: MockServer,
    pub source_dir: TempDir,
    pub spool_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self {
            mock_server: MockServer::start().await,
            source_dir: tempfile::tempdir().expect("source dir"),
            spool_dir: tempfile::tempdir().expect("spool dir"),
        }
    }

    pub fn config(&self) -> BusinessConfig {
        BusinessConfig::new(format!("{}/", self.mock_server.uri()))
            .with_spool_dir(self.spool_dir.path())
    }

    pub fn transport(&self) -> FileIoTransport {
        FileIoTransport::new(&self.config(), Client::default(), FsContentResolver)
    }

    /// Writes `contents` to a source file and returns a pending handle for it.
    pub fn source_file(&self, name: &str, contents: &[u8]) -> FileHandle {
        let path = self.source_dir.path().join(name);
        std::fs::write(&path, contents).expect("write source file");
        FileHandle::from_selection(Selection::new(
            Locator::from_path(&path),
            name,
            "text/plain",
            contents.len() as u64,
        ))
    }

    /// Answers every upload POST with `status` and `body`.
    pub async fn mount_upload_response(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.mock_server)
            .await;
    }

    /// Number of files currently in the spool directory.
    pub fn spool_entries(&self) -> usize {
        std::fs::read_dir(self.spool_dir.path())
            .expect("read spool dir")
            .count()
    }
}
