//! PostgreSQL implementation of RevisionStore.
//!
//! `(document_uuid, content_hash)` carries a unique constraint, so the
//! upsert races safely: whichever producer inserts first wins and every
//! later observer gets the existing row back.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::{DocumentRevision, NewRevision, StoreError};
use crate::ports::RevisionStore;

/// PostgreSQL implementation of RevisionStore.
#[derive(Clone)]
pub struct PostgresRevisionStore {
    pool: PgPool,
}

impl PostgresRevisionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevisionStore for PostgresRevisionStore {
    async fn upsert(&self, new: NewRevision) -> Result<(DocumentRevision, bool), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::backend("begin revision upsert", e))?;

        let result = upsert_in_tx(&mut tx, &new).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::backend("commit revision upsert", e))?;

        Ok(result)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<DocumentRevision>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, document_uuid, document_id, provider_type, title,
                   content_hash, status, modified_time, created_at
            FROM document_revisions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::backend("fetch revision", e))?;

        row.map(row_to_revision).transpose()
    }
}

/// Upserts a revision inside an existing transaction.
///
/// The boolean is `true` when this call created the row.
pub(crate) async fn upsert_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    new: &NewRevision,
) -> Result<(DocumentRevision, bool), StoreError> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO document_revisions (
            document_uuid, document_id, provider_type, title,
            content_hash, status, modified_time
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (document_uuid, content_hash) DO NOTHING
        RETURNING id, document_uuid, document_id, provider_type, title,
                  content_hash, status, modified_time, created_at
        "#,
    )
    .bind(new.document_uuid)
    .bind(&new.document_id)
    .bind(&new.provider_type)
    .bind(&new.title)
    .bind(&new.content_hash)
    .bind(&new.status)
    .bind(new.modified_time)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| StoreError::backend("insert revision", e))?;

    if let Some(row) = inserted {
        return Ok((row_to_revision(row)?, true));
    }

    // Same content already observed for this document; hand back the
    // existing row.
    let row = sqlx::query(
        r#"
        SELECT id, document_uuid, document_id, provider_type, title,
               content_hash, status, modified_time, created_at
        FROM document_revisions
        WHERE document_uuid = $1 AND content_hash = $2
        "#,
    )
    .bind(new.document_uuid)
    .bind(&new.content_hash)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| StoreError::backend("fetch existing revision", e))?;

    Ok((row_to_revision(row)?, false))
}

fn row_to_revision(row: PgRow) -> Result<DocumentRevision, StoreError> {
    let decode = |e: sqlx::Error| StoreError::backend("decode revision row", e);

    Ok(DocumentRevision {
        id: row.try_get("id").map_err(decode)?,
        document_uuid: row.try_get("document_uuid").map_err(decode)?,
        document_id: row.try_get("document_id").map_err(decode)?,
        provider_type: row.try_get("provider_type").map_err(decode)?,
        title: row.try_get("title").map_err(decode)?,
        content_hash: row.try_get("content_hash").map_err(decode)?,
        status: row.try_get("status").map_err(decode)?,
        modified_time: row.try_get("modified_time").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}
