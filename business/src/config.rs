use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::file_item::MAX_FILE_SIZE;

/// Prefix of every environment variable read by [`BusinessConfig::from_env`].
pub const ENV_PREFIX: &str = "FILEPICKER_";

const DEFAULT_HOSTING_URL: &str = "https://file.io";
const DEFAULT_STORE_COLLECTION: &str = "files";
const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 3;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    Parse(String),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

#[derive(Debug, Clone)]
pub struct BusinessConfig {
    /// Multipart upload endpoint of the file host.
    pub hosting_url: String,
    /// Base URL of the document store. `None` keeps metadata in memory.
    pub store_url: Option<String>,
    /// Collection every file record is written into.
    pub store_collection: String,
    pub max_file_size: u64,
    pub max_concurrent_uploads: usize,
    pub request_timeout: Duration,
    /// Directory for spooled upload copies. Defaults to the system temp dir.
    pub spool_dir: PathBuf,
}

impl BusinessConfig {
    pub fn new(hosting_url: impl Into<String>) -> Self {
        Self {
            hosting_url: hosting_url.into(),
            ..Self::default()
        }
    }

    pub fn with_store_url(mut self, url: impl Into<String>) -> Self {
        self.store_url = Some(url.into());
        self
    }

    pub fn with_spool_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.spool_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_max_concurrent_uploads(mut self, limit: usize) -> Self {
        self.max_concurrent_uploads = limit;
        self
    }

    pub fn with_max_file_size(mut self, limit: u64) -> Self {
        self.max_file_size = limit;
        self
    }

    /// Reads `FILEPICKER_*` variables, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars = std::env::vars().filter_map(|(key, value)| {
            key.strip_prefix(ENV_PREFIX)
                .map(|stripped| (stripped.to_owned(), value))
        });
        Self::from_vars(vars)
    }

    /// Builds a config from prefix-stripped `(KEY, value)` pairs.
    pub fn from_vars(
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_env::from_iter(vars.into_iter().collect::<Vec<_>>())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_concurrent_uploads = raw
            .max_concurrent_uploads
            .unwrap_or(defaults.max_concurrent_uploads);
        if max_concurrent_uploads == 0 {
            return Err(ConfigError::Zero {
                field: "max_concurrent_uploads",
            });
        }

        let max_file_size = raw.max_file_size.unwrap_or(defaults.max_file_size);
        if max_file_size == 0 {
            return Err(ConfigError::Zero {
                field: "max_file_size",
            });
        }

        let config = Self {
            hosting_url: raw.hosting_url.unwrap_or(defaults.hosting_url),
            store_url: raw.store_url.or(defaults.store_url),
            store_collection: raw.store_collection.unwrap_or(defaults.store_collection),
            max_file_size,
            max_concurrent_uploads,
            request_timeout: raw
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            spool_dir: raw.spool_dir.unwrap_or(defaults.spool_dir),
        };
        info!(
            "Upload config: host={}, store={:?}, concurrency={}",
            config.hosting_url, config.store_url, config.max_concurrent_uploads
        );
        Ok(config)
    }
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            hosting_url: DEFAULT_HOSTING_URL.to_owned(),
            store_url: None,
            store_collection: DEFAULT_STORE_COLLECTION.to_owned(),
            max_file_size: MAX_FILE_SIZE,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            spool_dir: std::env::temp_dir(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    hosting_url: Option<String>,
    store_url: Option<String>,
    store_collection: Option<String>,
    max_file_size: Option<u64>,
    max_concurrent_uploads: Option<usize>,
    request_timeout_secs: Option<u64>,
    spool_dir: Option<PathBuf>,
}
