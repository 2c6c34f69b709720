//! In-memory outbox for testing.
//!
//! Reproduces the Postgres outbox's observable behavior: insert-if-absent
//! on the idempotent key, claims that exclude entries held by another
//! claim, and retention pruning. Claims release their entries when
//! dropped, committed or not, mirroring row locks ending with their
//! transaction.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::domain::{
    idempotent_key, DocumentRevision, EventMetadata, EventType, RevisionEvent, StoreError,
};
use crate::ports::{OutboxClaim, OutboxEntry, OutboxQueue};

struct Inner {
    entries: Vec<OutboxEntry>,
    next_id: i64,
    claimed: HashSet<i64>,
}

/// In-memory outbox acting as both write path and relay queue.
#[derive(Clone)]
pub struct InMemoryOutbox {
    inner: Arc<Mutex<Inner>>,
}

impl Default for InMemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: Vec::new(),
                next_id: 1,
                claimed: HashSet::new(),
            })),
        }
    }

    /// Write-side append with idempotent-key dedup, the in-memory
    /// equivalent of the transactional `publish_revision_event`.
    ///
    /// Returns the entry id when a row was inserted, `None` on a
    /// silent duplicate skip.
    pub fn append(
        &self,
        revision: &DocumentRevision,
        event_type: EventType,
        metadata: &EventMetadata,
    ) -> Result<Option<i64>, StoreError> {
        let key = idempotent_key(revision.document_uuid, &revision.content_hash, event_type);

        let mut inner = self.inner.lock().expect("outbox lock poisoned");
        if inner.entries.iter().any(|e| e.idempotent_key == key) {
            return Ok(None);
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let payload = RevisionEvent::new(revision.clone(), metadata.clone())
            .with_outbox_id(id)
            .to_payload()
            .map_err(|e| StoreError::backend("serialize event payload", e))?;
        inner.entries.push(OutboxEntry {
            id,
            revision_id: revision.id,
            event_type,
            payload,
            idempotent_key: key,
            published_at: None,
            attempt_count: 0,
            created_at: Utc::now(),
            partition_key: revision.document_uuid.to_string(),
        });

        Ok(Some(id))
    }

    // === Test Helpers ===

    pub fn entries(&self) -> Vec<OutboxEntry> {
        self.inner
            .lock()
            .expect("outbox lock poisoned")
            .entries
            .clone()
    }

    pub fn pending_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.published_at.is_none())
            .count()
    }

    pub fn published_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.published_at.is_some())
            .count()
    }
}

#[async_trait]
impl OutboxQueue for InMemoryOutbox {
    async fn claim(&self, limit: u32) -> Result<Box<dyn OutboxClaim>, StoreError> {
        let mut inner = self.inner.lock().expect("outbox lock poisoned");

        let entries: Vec<OutboxEntry> = inner
            .entries
            .iter()
            .filter(|e| e.published_at.is_none() && !inner.claimed.contains(&e.id))
            .take(limit as usize)
            .cloned()
            .collect();

        for entry in &entries {
            inner.claimed.insert(entry.id);
        }

        Ok(Box::new(InMemoryClaim {
            outbox: Arc::clone(&self.inner),
            entries,
            published: Vec::new(),
        }))
    }

    async fn prune_published(&self, older_than: Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - older_than;
        let mut inner = self.inner.lock().expect("outbox lock poisoned");
        let before = inner.entries.len();
        inner
            .entries
            .retain(|e| !e.published_at.is_some_and(|at| at < cutoff));
        Ok((before - inner.entries.len()) as u64)
    }
}

struct InMemoryClaim {
    outbox: Arc<Mutex<Inner>>,
    entries: Vec<OutboxEntry>,
    published: Vec<i64>,
}

#[async_trait]
impl OutboxClaim for InMemoryClaim {
    fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    async fn mark_published(&mut self, id: i64) -> Result<(), StoreError> {
        self.published.push(id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut inner = self.outbox.lock().expect("outbox lock poisoned");
        for id in &self.published {
            if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == *id) {
                entry.published_at = Some(Utc::now());
                entry.attempt_count += 1;
            }
        }
        // Drop releases the claims.
        Ok(())
    }
}

impl Drop for InMemoryClaim {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.outbox.lock() {
            for entry in &self.entries {
                inner.claimed.remove(&entry.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn revision(id: i64, content_hash: &str) -> DocumentRevision {
        DocumentRevision {
            id,
            document_uuid: Uuid::new_v4(),
            document_id: format!("doc-{id}"),
            provider_type: "google".to_string(),
            title: "T".to_string(),
            content_hash: content_hash.to_string(),
            status: "WIP".to_string(),
            modified_time: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_appends_are_silently_skipped() {
        let outbox = InMemoryOutbox::new();
        let rev = revision(1, "h1");

        let first = outbox
            .append(&rev, EventType::Created, &EventMetadata::new())
            .unwrap();
        let second = outbox
            .append(&rev, EventType::Created, &EventMetadata::new())
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(outbox.entries().len(), 1);
    }

    #[tokio::test]
    async fn claimed_entries_are_invisible_to_other_claims() {
        let outbox = InMemoryOutbox::new();
        outbox
            .append(&revision(1, "h1"), EventType::Created, &EventMetadata::new())
            .unwrap();

        let first = outbox.claim(10).await.unwrap();
        assert_eq!(first.entries().len(), 1);

        let second = outbox.claim(10).await.unwrap();
        assert!(second.entries().is_empty());

        // Dropping the first claim releases its entries.
        drop(first);
        drop(second);
        let third = outbox.claim(10).await.unwrap();
        assert_eq!(third.entries().len(), 1);
    }

    #[tokio::test]
    async fn only_acked_entries_are_marked_on_commit() {
        let outbox = InMemoryOutbox::new();
        outbox
            .append(&revision(1, "h1"), EventType::Created, &EventMetadata::new())
            .unwrap();
        outbox
            .append(&revision(2, "h2"), EventType::Created, &EventMetadata::new())
            .unwrap();

        let mut claim = outbox.claim(10).await.unwrap();
        let ids: Vec<i64> = claim.entries().iter().map(|e| e.id).collect();
        claim.mark_published(ids[0]).await.unwrap();
        claim.commit().await.unwrap();

        assert_eq!(outbox.published_count(), 1);
        assert_eq!(outbox.entries()[0].attempt_count, 1);

        // The unacked entry is untouched: still pending, no attempt
        // recorded, ready for the next claim.
        let retried = &outbox.entries()[1];
        assert_eq!(outbox.pending_count(), 1);
        assert_eq!(retried.attempt_count, 0);
        assert!(retried.published_at.is_none());
    }
}
