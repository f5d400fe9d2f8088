//! Temporary copies of picked files.
//!
//! Platform byte sources cannot always be re-read or streamed straight
//! into a request body, so the transport first copies them into a spool
//! file. A [`SpoolFile`] deletes its file when dropped, which covers every
//! exit path of an upload including a consumer dropping the stream.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempPath;

use crate::file_item::Locator;

/// Copies the bytes behind a [`Locator`] to a local path.
pub trait ContentResolver: Clone + Send + Sync + 'static {
    /// Returns the number of bytes written to `dest`.
    fn copy_to(
        &self,
        locator: &Locator,
        dest: &Path,
    ) -> impl Future<Output = io::Result<u64>> + Send;
}

/// Resolves `file://` URIs and plain filesystem paths.
#[derive(Debug, Clone, Default)]
pub struct FsContentResolver;

impl FsContentResolver {
    fn source_path(locator: &Locator) -> PathBuf {
        let raw = locator.as_str();
        PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw))
    }
}

impl ContentResolver for FsContentResolver {
    async fn copy_to(&self, locator: &Locator, dest: &Path) -> io::Result<u64> {
        let source = Self::source_path(locator);
        tokio::fs::copy(&source, dest).await
    }
}

/// A spooled copy of one picked file, removed on drop.
#[derive(Debug)]
pub struct SpoolFile {
    path: TempPath,
    len: u64,
}

impl SpoolFile {
    /// Creates `upload_*_<name>` inside `dir` and fills it from `locator`.
    ///
    /// If the copy fails the half-written file is removed before returning.
    pub async fn create<R: ContentResolver>(
        resolver: &R,
        locator: &Locator,
        dir: &Path,
        name: &str,
    ) -> io::Result<Self> {
        let suffix = format!("_{}", sanitize_file_name(name));
        let dir = dir.to_path_buf();
        let path = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix("upload_")
                .suffix(&suffix)
                .tempfile_in(dir)
                .map(tempfile::NamedTempFile::into_temp_path)
        })
        .await
        .map_err(io::Error::other)??;

        let len = resolver.copy_to(locator, &path).await?;
        debug!("Spooled {} bytes from {} to {}", len, locator, path.display());
        Ok(Self { path, len })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Opens the spooled copy for streaming into a request body.
    pub async fn open(&self) -> io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }
}

/// Keeps a display name usable as part of a file name.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}
