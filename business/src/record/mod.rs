//! Metadata recording for hosted files.
//!
//! After the transport hosts a file, the [`MetadataRecorder`] writes one
//! [`FileRecord`] describing it to a [`DocumentStore`] on behalf of the
//! signed-in user. The record id becomes the handle's new identity.

mod mock;
mod rest;
mod traits;
mod types;

pub use mock::MockDocumentStore;
pub use rest::RestDocumentStore;
pub use traits::DocumentStore;
pub use types::{FileRecord, RECORD_STATUS_COMPLETED, ServerTimestamp, StoreError, StoredRecord};

use async_stream::stream;
use futures::stream::BoxStream;
use log::{info, warn};
use uuid::Uuid;

use crate::auth_state::{AuthSession, Credentials};
use crate::config::BusinessConfig;
use crate::error::UploadError;
use crate::file_item::FileHandle;
use crate::http::Client;

/// Progress reported while the metadata write is in flight.
pub const RECORDING_WATERMARK: f32 = 0.5;

/// The store selected by [`BusinessConfig::store_url`].
#[derive(Debug, Clone)]
pub enum ConfiguredStore {
    Rest(RestDocumentStore),
    /// No store URL configured; records only live in memory.
    Memory(MockDocumentStore),
}

impl ConfiguredStore {
    pub fn from_config(config: &BusinessConfig, client: Client) -> Self {
        match &config.store_url {
            Some(url) => Self::Rest(RestDocumentStore::new(client, url.as_str())),
            None => {
                warn!("No document store configured, keeping file records in memory");
                Self::Memory(MockDocumentStore::new())
            }
        }
    }
}

impl DocumentStore for ConfiguredStore {
    async fn put_record(
        &self,
        collection: &str,
        record: &FileRecord,
        credentials: &Credentials,
    ) -> Result<(), StoreError> {
        match self {
            Self::Rest(store) => store.put_record(collection, record, credentials).await,
            Self::Memory(store) => store.put_record(collection, record, credentials).await,
        }
    }
}

/// Writes one metadata document per hosted file.
#[derive(Debug, Clone)]
pub struct MetadataRecorder<S> {
    store: S,
    session: AuthSession,
    collection: String,
}

impl<S: DocumentStore> MetadataRecorder<S> {
    pub fn new(store: S, session: AuthSession, collection: impl Into<String>) -> Self {
        Self {
            store,
            session,
            collection: collection.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records `handle` as hosted at `external_url`.
    ///
    /// Emits `Uploading(0.5)` under a fresh record id, then exactly one
    /// terminal event. Without a signed-in user nothing is written and the
    /// only event is a `Failed` one.
    pub fn record(&self, handle: FileHandle, external_url: String) -> BoxStream<'static, FileHandle> {
        let this = self.clone();
        Box::pin(stream! {
            let credentials = match this.session.credentials() {
                Some(credentials) => credentials,
                None => {
                    warn!("Not recording {}: no signed-in user", handle.name());
                    yield handle
                        .uploading(RECORDING_WATERMARK)
                        .failed(UploadError::AuthenticationRequired.to_string());
                    return;
                }
            };

            let record_id = Uuid::new_v4().to_string();
            let recording = handle.with_id(record_id.as_str()).uploading(RECORDING_WATERMARK);
            yield recording.clone();

            let record = FileRecord::new(
                record_id.as_str(),
                &handle,
                external_url.as_str(),
                credentials.user_id.as_str(),
            );
            match this.store.put_record(&this.collection, &record, &credentials).await {
                Ok(()) => {
                    info!("Recorded {} as {}/{}", handle.name(), this.collection, record_id);
                    yield recording.completed(external_url);
                }
                Err(e) => {
                    warn!("Failed to record {}: {}", handle.name(), e);
                    yield recording.failed(UploadError::record_write(e).to_string());
                }
            }
        })
    }
}
