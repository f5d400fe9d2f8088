//! Document store over a Realtime-Database style REST API.

use log::{debug, warn};

use super::traits::DocumentStore;
use super::types::{FileRecord, StoreError};
use crate::auth_state::Credentials;
use crate::http::Client;

/// Writes each record with `PUT {base}/{collection}/{id}.json?auth=<token>`.
#[derive(Debug, Clone)]
pub struct RestDocumentStore {
    client: Client,
    base_url: String,
}

impl RestDocumentStore {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, collection, id)
    }
}

impl DocumentStore for RestDocumentStore {
    async fn put_record(
        &self,
        collection: &str,
        record: &FileRecord,
        credentials: &Credentials,
    ) -> Result<(), StoreError> {
        let url = self.document_url(collection, &record.id);
        debug!("Writing file record {} to {}", record.id, url);

        let response = self
            .client
            .put(url)
            .query("auth", credentials.token.as_str())
            .json(record)
            .map_err(|e| StoreError::Encode(e.to_string()))?
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;

        if response.is_success() {
            Ok(())
        } else {
            warn!(
                "Document store rejected record {}: {} {}",
                record.id,
                response.status,
                response.text()
            );
            Err(StoreError::Status(response.status))
        }
    }
}
