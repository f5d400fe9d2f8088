//! Single-shot upload of one file to the hosting endpoint.
//!
//! The transport emits a short, finite sequence of [`FileHandle`] events:
//! a few fixed progress watermarks followed by exactly one terminal event
//! (`Completed` or `Failed`). There are no retries; a failed upload is
//! re-attempted only when the user selects the file again.

use std::io;
use std::path::PathBuf;
use std::sync::LazyLock;

use async_stream::stream;
use futures::stream::BoxStream;
use log::{info, warn};
use regex::Regex;
use reqwest::multipart::{Form, Part};

use crate::config::BusinessConfig;
use crate::error::UploadError;
use crate::file_item::FileHandle;
use crate::http::{Client, Response};
use crate::spool::{ContentResolver, FsContentResolver, SpoolFile};

/// Accepted by the transport, before any I/O.
pub const ACCEPTED_WATERMARK: f32 = 0.1;
/// Source bytes copied into the spool file.
pub const SPOOLED_WATERMARK: f32 = 0.2;
/// Multipart request built and about to be sent.
pub const REQUEST_READY_WATERMARK: f32 = 0.4;

/// Multipart field carrying the file bytes.
pub const FILE_FIELD: &str = "file";

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

static SUCCESS_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""success"\s*:\s*true"#).ok());

static LINK_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""link"\s*:\s*"([^"]+)""#).ok());

/// Uploads one file and reports progress as a stream of handle snapshots.
pub trait HostingTransport: Clone + Send + Sync + 'static {
    /// The returned stream is lazy: nothing happens until it is polled.
    /// It ends after exactly one terminal event.
    fn upload(&self, handle: FileHandle) -> BoxStream<'static, FileHandle>;
}

/// Extracts the hosted link from a file.io style response body.
///
/// Only the `"success":true` marker and the `"link":"..."` field are
/// looked at; the rest of the body is ignored.
pub fn parse_hosting_response(body: &str) -> Option<String> {
    let success = SUCCESS_PATTERN.as_ref()?;
    let link_pattern = LINK_PATTERN.as_ref()?;
    if !success.is_match(body) {
        return None;
    }
    link_pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|link| link.as_str().replace("\\/", "/"))
}

/// Uploads to a file.io compatible endpoint with one multipart POST.
#[derive(Debug, Clone)]
pub struct FileIoTransport<R = FsContentResolver> {
    client: Client,
    endpoint: String,
    spool_dir: PathBuf,
    max_file_size: u64,
    resolver: R,
}

impl<R: ContentResolver> FileIoTransport<R> {
    pub fn new(config: &BusinessConfig, client: Client, resolver: R) -> Self {
        Self {
            client,
            endpoint: config.hosting_url.clone(),
            spool_dir: config.spool_dir.clone(),
            max_file_size: config.max_file_size,
            resolver,
        }
    }

    async fn build_form(handle: &FileHandle, spool: &SpoolFile) -> io::Result<Form> {
        let file = spool.open().await?;
        let part = Part::stream_with_length(reqwest::Body::from(file), spool.len())
            .file_name(handle.name().to_owned())
            .mime_str(content_type(handle.mime_type()))
            .map_err(io::Error::other)?;
        Ok(Form::new().part(FILE_FIELD, part))
    }

    fn finish(handle: &FileHandle, in_flight: &FileHandle, response: &Response) -> FileHandle {
        if !response.is_success() {
            warn!(
                "Upload of {} rejected with status {}",
                handle.name(),
                response.status
            );
            return in_flight.failed(UploadError::HttpStatus(response.status).to_string());
        }

        match parse_hosting_response(&response.text()) {
            Some(link) => {
                info!("Uploaded {} to {}", handle.name(), link);
                handle.completed(link)
            }
            None => {
                warn!("Unrecognized upload response for {}", handle.name());
                in_flight.failed(UploadError::ResponseParse.to_string())
            }
        }
    }
}

impl<R: ContentResolver> HostingTransport for FileIoTransport<R> {
    fn upload(&self, handle: FileHandle) -> BoxStream<'static, FileHandle> {
        let this = self.clone();
        Box::pin(stream! {
            if handle.size() > this.max_file_size {
                let err = UploadError::size_limit(handle.size(), this.max_file_size);
                warn!("Rejecting {} ({} bytes): {}", handle.name(), handle.size(), err);
                yield handle.failed(err.to_string());
                return;
            }

            let accepted = handle.uploading(ACCEPTED_WATERMARK);
            yield accepted.clone();

            let spool = match SpoolFile::create(
                &this.resolver,
                handle.locator(),
                &this.spool_dir,
                handle.name(),
            )
            .await
            {
                Ok(spool) => spool,
                Err(e) => {
                    warn!("Could not spool {}: {}", handle.name(), e);
                    yield accepted.failed(UploadError::transport(e).to_string());
                    return;
                }
            };

            let spooled = handle.uploading(SPOOLED_WATERMARK);
            yield spooled.clone();

            let form = match Self::build_form(&handle, &spool).await {
                Ok(form) => form,
                Err(e) => {
                    yield spooled.failed(UploadError::transport(e).to_string());
                    return;
                }
            };

            let prepared = handle.uploading(REQUEST_READY_WATERMARK);
            yield prepared.clone();

            let outcome = this.client.post(&this.endpoint).multipart(form).send().await;
            let terminal = match outcome {
                Ok(response) => Self::finish(&handle, &prepared, &response),
                Err(e) => {
                    warn!("Upload of {} failed: {}", handle.name(), e);
                    prepared.failed(UploadError::transport(e).to_string())
                }
            };

            // The spool must be gone before the terminal event is observed.
            drop(spool);
            yield terminal;
        })
    }
}

/// Declared MIME type if it looks like `type/subtype`, octet-stream otherwise.
fn content_type(mime_type: &str) -> &str {
    let well_formed = mime_type
        .split_once('/')
        .is_some_and(|(kind, sub)| {
            !kind.is_empty() && !sub.is_empty() && !mime_type.contains(char::is_whitespace)
        });
    if well_formed {
        mime_type
    } else {
        FALLBACK_CONTENT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_item::{Locator, UploadState};
    use crate::test_utils::{TestContext, file_io_success_body};
    use futures::StreamExt;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn parses_link_from_success_body() {
        let body = r#"{"success":true,"key":"k1","link":"https://file.io/k1"}"#;
        assert_eq!(
            parse_hosting_response(body),
            Some("https://file.io/k1".to_owned())
        );
    }

    #[test]
    fn parses_spaced_and_escaped_bodies() {
        let body = r#"{ "success": true, "link": "https:\/\/file.io\/k2" }"#;
        assert_eq!(
            parse_hosting_response(body),
            Some("https://file.io/k2".to_owned())
        );
    }

    #[test]
    fn rejects_unsuccessful_or_linkless_bodies() {
        assert_eq!(parse_hosting_response(r#"{"success":false}"#), None);
        assert_eq!(parse_hosting_response(r#"{"success":true,"key":"k"}"#), None);
        assert_eq!(parse_hosting_response("not json at all"), None);
    }

    #[test]
    fn content_type_falls_back_for_malformed_mime() {
        assert_eq!(content_type("text/plain"), "text/plain");
        assert_eq!(content_type("text"), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type("/plain"), FALLBACK_CONTENT_TYPE);
        assert_eq!(content_type("text/ plain"), FALLBACK_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn successful_upload_emits_watermarks_then_completed() {
        let ctx = TestContext::new().await;
        Mock::given(method("POST"))
            .and(body_string_contains("name=\"file\""))
            .and(body_string_contains("filename=\"a.txt\""))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(file_io_success_body("k1")),
            )
            .expect(1)
            .mount(&ctx.mock_server)
            .await;

        let handle = ctx.source_file("a.txt", &[b'x'; 500]);
        let events: Vec<FileHandle> = ctx.transport().upload(handle).collect().await;

        let progress: Vec<f32> = events.iter().map(FileHandle::upload_progress).collect();
        assert_eq!(progress, vec![0.1, 0.2, 0.4, 1.0]);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));

        let last = events.last().unwrap();
        assert_eq!(last.upload_state(), UploadState::Completed);
        assert_eq!(last.upload_url(), Some("https://file.io/k1"));
        assert_eq!(ctx.spool_entries(), 0);
    }

    #[tokio::test]
    async fn oversized_file_fails_without_network() {
        let ctx = TestContext::new().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&ctx.mock_server)
            .await;

        let handle = FileHandle::new(
            "big",
            "b.bin",
            Locator::new("/nowhere/b.bin"),
            "application/octet-stream",
            3 * 1024 * 1024 * 1024,
        );
        let events: Vec<FileHandle> = ctx.transport().upload(handle).collect().await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].upload_state(), UploadState::Failed);
        assert!(events[0].error_message().unwrap().contains("2GB"));
    }

    #[tokio::test]
    async fn server_error_status_fails_with_code() {
        let ctx = TestContext::new().await;
        ctx.mount_upload_response(500, "oops").await;

        let events: Vec<FileHandle> = ctx
            .transport()
            .upload(ctx.source_file("c.txt", b"data"))
            .collect()
            .await;

        let last = events.last().unwrap();
        assert_eq!(last.upload_state(), UploadState::Failed);
        assert!(last.error_message().unwrap().contains("500"));
        assert_eq!(last.upload_progress(), REQUEST_READY_WATERMARK);
        assert_eq!(ctx.spool_entries(), 0);
    }

    #[tokio::test]
    async fn unsuccessful_body_is_a_parse_failure() {
        let ctx = TestContext::new().await;
        ctx.mount_upload_response(200, r#"{"success":false}"#).await;

        let events: Vec<FileHandle> = ctx
            .transport()
            .upload(ctx.source_file("d.txt", b"data"))
            .collect()
            .await;

        let last = events.last().unwrap();
        assert_eq!(last.upload_state(), UploadState::Failed);
        assert!(last.error_message().unwrap().contains("parse"));
    }

    #[tokio::test]
    async fn missing_source_fails_after_acceptance() {
        let ctx = TestContext::new().await;
        let handle = FileHandle::new(
            "gone",
            "gone.txt",
            Locator::new("/definitely/missing/gone.txt"),
            "text/plain",
            4,
        );

        let events: Vec<FileHandle> = ctx.transport().upload(handle).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].upload_progress(), ACCEPTED_WATERMARK);
        assert!(events[1].is_failed());
        assert!(events[1].error_message().unwrap().starts_with("Upload failed:"));
        assert_eq!(ctx.spool_entries(), 0);
    }

    #[tokio::test]
    async fn two_runs_use_independent_spools() {
        let ctx = TestContext::new().await;
        ctx.mount_upload_response(200, &file_io_success_body("k")).await;
        let handle = ctx.source_file("twice.txt", b"again");

        let first: Vec<FileHandle> = ctx.transport().upload(handle.clone()).collect().await;
        assert_eq!(ctx.spool_entries(), 0);
        let second: Vec<FileHandle> = ctx.transport().upload(handle).collect().await;
        assert_eq!(ctx.spool_entries(), 0);

        assert!(first.last().unwrap().is_completed());
        assert!(second.last().unwrap().is_completed());
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_the_spool() {
        let ctx = TestContext::new().await;
        ctx.mount_upload_response(200, &file_io_success_body("k")).await;
        let handle = ctx.source_file("dropped.txt", b"bytes");

        let mut events = ctx.transport().upload(handle);
        assert_eq!(events.next().await.unwrap().upload_progress(), ACCEPTED_WATERMARK);
        assert_eq!(events.next().await.unwrap().upload_progress(), SPOOLED_WATERMARK);
        assert_eq!(ctx.spool_entries(), 1);

        drop(events);
        assert_eq!(ctx.spool_entries(), 0);
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_failure() {
        let ctx = TestContext::new().await;
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut config = ctx.config();
        config.hosting_url = format!("http://{addr}/");
        let transport = FileIoTransport::new(&config, Client::default(), FsContentResolver);

        let events: Vec<FileHandle> = transport
            .upload(ctx.source_file("e.txt", b"data"))
            .collect()
            .await;

        let last = events.last().unwrap();
        assert!(last.is_failed());
        assert!(last.error_message().unwrap().starts_with("Upload failed:"));
        assert_eq!(ctx.spool_entries(), 0);
    }
}
