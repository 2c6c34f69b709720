//! ExecutionStore port - persisted pipeline-execution rows.
//!
//! Every transition is an independent atomic write, so a process dying
//! between steps leaves a consistent row: `running` with the step
//! records written so far. Such rows past the stale timeout are
//! abandoned; redelivery of the originating outbox event re-executes
//! the pipeline under a fresh row.

use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

use crate::domain::{PipelineExecution, StepRecord, StoreError};

/// Port for recording pipeline executions.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Inserts a new execution row in `running` state.
    async fn create(&self, execution: &PipelineExecution) -> Result<(), StoreError>;

    /// Appends one step outcome to `step_results`.
    async fn record_step(&self, id: Uuid, record: &StepRecord) -> Result<(), StoreError>;

    /// Terminal transition: all steps succeeded.
    async fn mark_completed(&self, id: Uuid) -> Result<(), StoreError>;

    /// Terminal transition: retryable failures occurred, none aborted.
    async fn mark_partial(&self, id: Uuid, first_error: &str) -> Result<(), StoreError>;

    /// Terminal transition: `step` aborted the pipeline permanently.
    async fn mark_failed(&self, id: Uuid, step: &str, error: &str) -> Result<(), StoreError>;

    /// Fetches one execution row.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PipelineExecution>, StoreError>;

    /// Executions stuck in `running` longer than `stale_after`,
    /// for operator inspection.
    async fn abandoned(&self, stale_after: Duration) -> Result<Vec<PipelineExecution>, StoreError>;
}
