//! PostgreSQL outbox: transactional writes and the relay queue.
//!
//! Writes happen through [`publish_revision_event`] inside the caller's
//! transaction; the outbox never opens one of its own. The relay side
//! claims unpublished rows with `FOR UPDATE SKIP LOCKED`, so multiple
//! relay instances coordinate through row locks and at most one
//! publishes any given entry at a time.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::{
    idempotent_key, DocumentRevision, EventMetadata, EventType, RevisionEvent, StoreError,
};
use crate::ports::{OutboxClaim, OutboxEntry, OutboxQueue};

/// Appends an outbox entry inside the caller's transaction.
///
/// This is the sole mechanism by which the write path guarantees that a
/// committed revision has a corresponding durable event: the entry
/// commits or rolls back together with the revision change.
///
/// Duplicate events (same document, content, and event type) are
/// silently skipped via the idempotent-key unique constraint; the
/// caller's transaction sees no error. Returns the entry id when a row
/// was inserted.
pub async fn publish_revision_event(
    tx: &mut Transaction<'_, Postgres>,
    revision: &DocumentRevision,
    event_type: EventType,
    metadata: &EventMetadata,
) -> Result<Option<i64>, StoreError> {
    let key = idempotent_key(revision.document_uuid, &revision.content_hash, event_type);

    let inserted = sqlx::query(
        r#"
        INSERT INTO outbox_entries (revision_id, event_type, payload, idempotent_key)
        VALUES ($1, $2, ''::bytea, $3)
        ON CONFLICT (idempotent_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(revision.id)
    .bind(event_type.as_str())
    .bind(&key)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| StoreError::backend("insert outbox entry", e))?;

    let Some(row) = inserted else {
        // Another producer already recorded this observation; silently
        // skip so the caller's transaction proceeds unharmed.
        return Ok(None);
    };

    let id: i64 = row
        .try_get("id")
        .map_err(|e| StoreError::backend("decode outbox id", e))?;

    // The envelope carries its own outbox id, so serialize once the
    // insert has assigned one. Same transaction, so the payload is
    // never observable half-written.
    let payload = RevisionEvent::new(revision.clone(), metadata.clone())
        .with_outbox_id(id)
        .to_payload()
        .map_err(|e| StoreError::backend("serialize event payload", e))?;

    sqlx::query("UPDATE outbox_entries SET payload = $2 WHERE id = $1")
        .bind(id)
        .bind(&payload)
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::backend("write outbox payload", e))?;

    Ok(Some(id))
}

/// PostgreSQL implementation of OutboxQueue.
#[derive(Clone)]
pub struct PostgresOutboxQueue {
    pool: PgPool,
}

impl PostgresOutboxQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxQueue for PostgresOutboxQueue {
    async fn claim(&self, limit: u32) -> Result<Box<dyn OutboxClaim>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::backend("begin outbox claim", e))?;

        let rows = sqlx::query(
            r#"
            SELECT o.id, o.revision_id, o.event_type, o.payload,
                   o.idempotent_key, o.published_at, o.attempt_count,
                   o.created_at, r.document_uuid::text AS partition_key
            FROM outbox_entries o
            JOIN document_revisions r ON r.id = o.revision_id
            WHERE o.published_at IS NULL
            ORDER BY o.id ASC
            LIMIT $1
            FOR UPDATE OF o SKIP LOCKED
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StoreError::backend("claim outbox batch", e))?;

        let entries = rows
            .into_iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Box::new(PostgresOutboxClaim { tx, entries }))
    }

    async fn prune_published(&self, older_than: Duration) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - older_than;

        let result = sqlx::query(
            "DELETE FROM outbox_entries WHERE published_at IS NOT NULL AND published_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend("prune outbox entries", e))?;

        Ok(result.rows_affected())
    }
}

/// A claimed batch whose row locks live as long as the transaction.
struct PostgresOutboxClaim {
    tx: Transaction<'static, Postgres>,
    entries: Vec<OutboxEntry>,
}

#[async_trait]
impl OutboxClaim for PostgresOutboxClaim {
    fn entries(&self) -> &[OutboxEntry] {
        &self.entries
    }

    async fn mark_published(&mut self, id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE outbox_entries
            SET published_at = now(), attempt_count = attempt_count + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::backend("mark outbox entry published", e))?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::backend("commit outbox claim", e))
    }
}

fn row_to_entry(row: PgRow) -> Result<OutboxEntry, StoreError> {
    let decode = |e: sqlx::Error| StoreError::backend("decode outbox row", e);

    let event_type: String = row.try_get("event_type").map_err(decode)?;
    let event_type = EventType::parse(&event_type).ok_or_else(|| StoreError::Backend {
        context: "decode outbox row",
        message: format!("unknown event type {event_type:?}"),
    })?;

    Ok(OutboxEntry {
        id: row.try_get("id").map_err(decode)?,
        revision_id: row.try_get("revision_id").map_err(decode)?,
        event_type,
        payload: row.try_get("payload").map_err(decode)?,
        idempotent_key: row.try_get("idempotent_key").map_err(decode)?,
        published_at: row.try_get("published_at").map_err(decode)?,
        attempt_count: row.try_get("attempt_count").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        partition_key: row.try_get("partition_key").map_err(decode)?,
    })
}
