//! Document store trait definitions.

use std::future::Future;

use super::types::{FileRecord, StoreError};
use crate::auth_state::Credentials;

/// Single-document write access to the metadata store.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Writes `record` under `collection/record.id`, replacing any previous document.
    fn put_record(
        &self,
        collection: &str,
        record: &FileRecord,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
