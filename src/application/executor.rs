//! Pipeline executor - runs one ruleset's pipeline for one event.
//!
//! Steps run strictly in the ruleset's declared order. A permanent
//! failure aborts the pipeline: continuing would build on invalid
//! state. A retryable failure is recorded and later steps still run,
//! since independent steps (say, embeddings) can fail transiently
//! without blocking the others; redelivery retries the whole execution.

use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::{
    DocumentRevision, PipelineExecution, Ruleset, StepError, StepRecord, StoreError,
};
use crate::ports::{ExecutionStore, StepContext};

use super::StepRegistry;

/// Why an execution did not complete.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The first step failure seen, per the executor's contract.
    #[error(transparent)]
    Step(#[from] StepError),

    /// The execution store itself failed; transient, retried via
    /// redelivery.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs ruleset pipelines and records their outcomes.
pub struct PipelineExecutor {
    registry: Arc<StepRegistry>,
    store: Arc<dyn ExecutionStore>,
    default_step_timeout: Duration,
}

impl PipelineExecutor {
    pub fn new(
        registry: Arc<StepRegistry>,
        store: Arc<dyn ExecutionStore>,
        default_step_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            default_step_timeout,
        }
    }

    /// Executes `ruleset` against one revision event.
    ///
    /// Returns `Ok` when every step succeeded, otherwise the first
    /// error seen. The execution row always reaches a terminal state
    /// before this returns.
    pub async fn execute(
        &self,
        revision: &DocumentRevision,
        outbox_id: i64,
        ruleset: &Ruleset,
    ) -> Result<(), ExecutionError> {
        let mut execution = PipelineExecution::start(
            revision.id,
            outbox_id,
            ruleset.name.clone(),
            ruleset.pipeline.clone(),
        );
        self.store.create(&execution).await?;

        info!(
            execution_id = %execution.id,
            document_uuid = %revision.document_uuid,
            ruleset = %ruleset.name,
            outbox_id,
            steps = execution.planned_steps.len(),
            "pipeline execution started"
        );

        let mut first_retryable: Option<StepError> = None;

        for step_name in &ruleset.pipeline {
            let Some(step) = self.registry.lookup(step_name) else {
                // Startup validation should have caught this; a reload
                // race can still surface it here.
                let message = "step is not registered";
                self.store
                    .mark_failed(execution.id, step_name, message)
                    .await?;
                warn!(execution_id = %execution.id, step = %step_name, "unknown step aborted pipeline");
                return Err(StepError::permanent(format!("{step_name}: {message}")).into());
            };

            let ctx = StepContext::new(revision.clone(), ruleset.config_for(step_name));
            let timeout = self.step_timeout(ruleset, step_name);
            let started = Instant::now();

            let outcome = match tokio::time::timeout(timeout, step.execute(&ctx)).await {
                Ok(result) => result,
                Err(_) => Err(StepError::retryable(format!(
                    "step timed out after {}s",
                    timeout.as_secs()
                ))),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(()) => {
                    let record = StepRecord::success(step_name, duration_ms);
                    self.store.record_step(execution.id, &record).await?;
                    execution.record_step(record);
                }
                Err(error) => {
                    let record = StepRecord::failed(step_name, duration_ms, error.to_string());
                    self.store.record_step(execution.id, &record).await?;
                    execution.record_step(record);

                    warn!(
                        execution_id = %execution.id,
                        step = %step_name,
                        retryable = error.is_retryable(),
                        %error,
                        "step failed"
                    );

                    if error.is_retryable() {
                        // Later steps still run; the first error is the
                        // one surfaced.
                        first_retryable.get_or_insert(error);
                    } else {
                        self.store
                            .mark_failed(execution.id, step_name, &error.message)
                            .await?;
                        return Err(error.into());
                    }
                }
            }
        }

        match first_retryable {
            Some(error) => {
                self.store
                    .mark_partial(execution.id, &error.message)
                    .await?;
                Err(error.into())
            }
            None => {
                self.store.mark_completed(execution.id).await?;
                info!(execution_id = %execution.id, ruleset = %ruleset.name, "pipeline execution completed");
                Ok(())
            }
        }
    }

    /// Effective timeout for one step: the ruleset's `timeout_secs`
    /// option when set, the configured default otherwise.
    fn step_timeout(&self, ruleset: &Ruleset, step_name: &str) -> Duration {
        ruleset
            .config_for(step_name)
            .get("timeout_secs")
            .and_then(serde_json::Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(self.default_step_timeout)
    }
}
