//! Outbox ports - the relay's view of the durable event queue.
//!
//! Write-side outbox inserts happen inside producer transactions and are
//! adapter-specific (see `adapters::postgres::ingest`); these ports cover
//! the relay side: claiming a locked batch of unpublished entries,
//! marking acked ones, and pruning old published rows.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::{EventType, StoreError};

/// A durable event awaiting relay to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub id: i64,
    pub revision_id: i64,
    pub event_type: EventType,
    /// Opaque serialized envelope; the relay never looks inside.
    pub payload: Vec<u8>,
    pub idempotent_key: String,
    pub published_at: Option<DateTime<Utc>>,
    pub attempt_count: i32,
    pub created_at: DateTime<Utc>,
    /// Record key for partition affinity (the document uuid).
    pub partition_key: String,
}

/// A claimed batch of unpublished entries.
///
/// The claim holds whatever lock the backing store uses (row locks for
/// Postgres) until `commit` releases it, so concurrent relay instances
/// never publish the same entry at the same time. Dropping a claim
/// without committing releases the lock and leaves every entry
/// unpublished.
#[async_trait]
pub trait OutboxClaim: Send {
    /// Entries in this claim, ordered by ascending id.
    fn entries(&self) -> &[OutboxEntry];

    /// Records a producer ack: sets `published_at` and bumps
    /// `attempt_count`. Entries whose publish failed are simply not
    /// marked; their `published_at` stays null and the next claim
    /// retries them.
    async fn mark_published(&mut self, id: i64) -> Result<(), StoreError>;

    /// Commits the recorded marks and releases the claim's locks.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Port the relay polls for work.
#[async_trait]
pub trait OutboxQueue: Send + Sync {
    /// Claims up to `limit` unpublished entries, oldest first,
    /// skipping entries locked by a concurrent relay.
    async fn claim(&self, limit: u32) -> Result<Box<dyn OutboxClaim>, StoreError>;

    /// Deletes published entries whose `published_at` is older than the
    /// retention window. Returns the number of rows removed.
    async fn prune_published(&self, older_than: Duration) -> Result<u64, StoreError>;
}
