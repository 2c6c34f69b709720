//! PostgreSQL implementation of ExecutionStore.
//!
//! Each transition is a single statement, so the row stays consistent
//! however the executing process dies between steps.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{ExecutionStatus, PipelineExecution, StepRecord, StoreError};
use crate::ports::ExecutionStore;

/// PostgreSQL implementation of ExecutionStore.
#[derive(Clone)]
pub struct PostgresExecutionStore {
    pool: PgPool,
}

impl PostgresExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn finish(
        &self,
        id: Uuid,
        status: ExecutionStatus,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_executions
            SET status = $2, error = $3, finished_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend("finish execution", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ExecutionNotFound(id));
        }

        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for PostgresExecutionStore {
    async fn create(&self, execution: &PipelineExecution) -> Result<(), StoreError> {
        let planned = serde_json::to_value(&execution.planned_steps)
            .map_err(|e| StoreError::backend("serialize planned steps", e))?;
        let results = serde_json::to_value(&execution.step_results)
            .map_err(|e| StoreError::backend("serialize step results", e))?;

        sqlx::query(
            r#"
            INSERT INTO pipeline_executions (
                id, revision_id, outbox_id, ruleset_name,
                planned_steps, step_results, status, started_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(execution.id)
        .bind(execution.revision_id)
        .bind(execution.outbox_id)
        .bind(&execution.ruleset_name)
        .bind(planned)
        .bind(results)
        .bind(execution.status.as_str())
        .bind(execution.started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend("insert execution", e))?;

        Ok(())
    }

    async fn record_step(&self, id: Uuid, record: &StepRecord) -> Result<(), StoreError> {
        // jsonb array concatenation keeps records in execution order.
        let appended = serde_json::to_value(vec![record])
            .map_err(|e| StoreError::backend("serialize step record", e))?;

        let result = sqlx::query(
            "UPDATE pipeline_executions SET step_results = step_results || $2 WHERE id = $1",
        )
        .bind(id)
        .bind(appended)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend("record step result", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ExecutionNotFound(id));
        }

        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), StoreError> {
        self.finish(id, ExecutionStatus::Completed, None).await
    }

    async fn mark_partial(&self, id: Uuid, first_error: &str) -> Result<(), StoreError> {
        self.finish(id, ExecutionStatus::Partial, Some(first_error.to_string()))
            .await
    }

    async fn mark_failed(&self, id: Uuid, step: &str, error: &str) -> Result<(), StoreError> {
        self.finish(id, ExecutionStatus::Failed, Some(format!("{step}: {error}")))
            .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PipelineExecution>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, revision_id, outbox_id, ruleset_name, planned_steps,
                   step_results, status, started_at, finished_at, error
            FROM pipeline_executions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::backend("fetch execution", e))?;

        row.map(row_to_execution).transpose()
    }

    async fn abandoned(&self, stale_after: Duration) -> Result<Vec<PipelineExecution>, StoreError> {
        let cutoff = Utc::now() - stale_after;

        let rows = sqlx::query(
            r#"
            SELECT id, revision_id, outbox_id, ruleset_name, planned_steps,
                   step_results, status, started_at, finished_at, error
            FROM pipeline_executions
            WHERE status = 'running' AND started_at < $1
            ORDER BY started_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::backend("scan abandoned executions", e))?;

        rows.into_iter().map(row_to_execution).collect()
    }
}

fn row_to_execution(row: PgRow) -> Result<PipelineExecution, StoreError> {
    let decode = |e: sqlx::Error| StoreError::backend("decode execution row", e);
    let decode_json =
        |e: serde_json::Error| StoreError::backend("decode execution json", e);

    let planned: JsonValue = row.try_get("planned_steps").map_err(decode)?;
    let results: JsonValue = row.try_get("step_results").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let status = ExecutionStatus::parse(&status).ok_or_else(|| StoreError::Backend {
        context: "decode execution row",
        message: format!("unknown status {status:?}"),
    })?;

    Ok(PipelineExecution {
        id: row.try_get("id").map_err(decode)?,
        revision_id: row.try_get("revision_id").map_err(decode)?,
        outbox_id: row.try_get("outbox_id").map_err(decode)?,
        ruleset_name: row.try_get("ruleset_name").map_err(decode)?,
        planned_steps: serde_json::from_value(planned).map_err(decode_json)?,
        step_results: serde_json::from_value(results).map_err(decode_json)?,
        status,
        started_at: row.try_get("started_at").map_err(decode)?,
        finished_at: row.try_get("finished_at").map_err(decode)?,
        error: row.try_get("error").map_err(decode)?,
    })
}
