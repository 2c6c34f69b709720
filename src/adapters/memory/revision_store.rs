//! In-memory revision store for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex};

use crate::domain::{DocumentRevision, NewRevision, StoreError};
use crate::ports::RevisionStore;

/// In-memory implementation of RevisionStore with the same
/// `(document_uuid, content_hash)` identity as the Postgres adapter.
#[derive(Clone, Default)]
pub struct InMemoryRevisionStore {
    revisions: Arc<Mutex<Vec<DocumentRevision>>>,
}

impl InMemoryRevisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    pub fn revisions(&self) -> Vec<DocumentRevision> {
        self.revisions
            .lock()
            .expect("revision store lock poisoned")
            .clone()
    }

    pub fn count(&self) -> usize {
        self.revisions().len()
    }
}

#[async_trait]
impl RevisionStore for InMemoryRevisionStore {
    async fn upsert(&self, new: NewRevision) -> Result<(DocumentRevision, bool), StoreError> {
        let mut revisions = self
            .revisions
            .lock()
            .expect("revision store lock poisoned");

        if let Some(existing) = revisions
            .iter()
            .find(|r| r.document_uuid == new.document_uuid && r.content_hash == new.content_hash)
        {
            return Ok((existing.clone(), false));
        }

        let id = revisions.len() as i64 + 1;
        let revision = new.into_revision(id, Utc::now());
        revisions.push(revision.clone());
        Ok((revision, true))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<DocumentRevision>, StoreError> {
        Ok(self
            .revisions
            .lock()
            .expect("revision store lock poisoned")
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }
}
