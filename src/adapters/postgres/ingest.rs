//! The transactional write path producers call.
//!
//! One transaction covers both the revision upsert and the outbox
//! append, so a committed revision always has its durable event and a
//! rolled-back one leaves nothing behind. Producers see success as soon
//! as the transaction commits; the relay takes it from there.

use sqlx::PgPool;

use super::outbox::publish_revision_event;
use super::revision_store::upsert_in_tx;
use crate::domain::{DocumentRevision, EventMetadata, EventType, NewRevision, StoreError};

/// Producer-facing ingest service bundling C1 + C2 in one transaction.
#[derive(Clone)]
pub struct RevisionIngest {
    pool: PgPool,
}

impl RevisionIngest {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Records a revision observation and its lifecycle event.
    ///
    /// Content-hash identity is authoritative: when the upsert returns
    /// an existing row for a created/updated observation, no outbox
    /// entry is produced. Deletion events always write one; their
    /// idempotent key absorbs redundant deliveries.
    ///
    /// Returns the revision row and whether this call created it.
    pub async fn record_revision(
        &self,
        new: NewRevision,
        event_type: EventType,
        metadata: EventMetadata,
    ) -> Result<(DocumentRevision, bool), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::backend("begin ingest transaction", e))?;

        let (revision, created) = upsert_in_tx(&mut tx, &new).await?;

        if created || event_type == EventType::Deleted {
            publish_revision_event(&mut tx, &revision, event_type, &metadata).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::backend("commit ingest transaction", e))?;

        Ok((revision, created))
    }
}
