//! In-memory document store for testing.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;

use super::traits::DocumentStore;
use super::types::{FileRecord, StoreError, StoredRecord};
use crate::auth_state::Credentials;

/// In-memory implementation of [`DocumentStore`].
///
/// Records are keyed by `collection/id`. The store stamps `uploaded_at`
/// itself, the way a real backend resolves the server timestamp.
#[derive(Debug, Clone, Default)]
pub struct MockDocumentStore {
    records: Arc<RwLock<HashMap<String, StoredRecord>>>,
    rejection: Arc<RwLock<Option<String>>>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<StoredRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(collection, id))
            .cloned()
    }

    /// Every record of `collection`, in no particular order.
    pub fn records(&self, collection: &str) -> Vec<StoredRecord> {
        let prefix = format!("{collection}/");
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, stored)| stored.clone())
            .collect()
    }

    /// Makes every following write fail with `reason`.
    pub fn reject_writes(&self, reason: impl Into<String>) {
        *self
            .rejection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(reason.into());
    }

    pub fn accept_writes(&self) {
        *self
            .rejection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn clear(&self) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

impl DocumentStore for MockDocumentStore {
    async fn put_record(
        &self,
        collection: &str,
        record: &FileRecord,
        _credentials: &Credentials,
    ) -> Result<(), StoreError> {
        if let Some(reason) = self
            .rejection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(StoreError::Rejected(reason));
        }

        let stored = StoredRecord {
            record: record.clone(),
            uploaded_at: Utc::now(),
        };
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(collection, &record.id), stored);
        Ok(())
    }
}
