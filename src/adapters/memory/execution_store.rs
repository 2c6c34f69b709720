//! In-memory execution store for testing.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::domain::{PipelineExecution, StepRecord, StoreError};
use crate::ports::ExecutionStore;

/// In-memory implementation of ExecutionStore.
#[derive(Clone, Default)]
pub struct InMemoryExecutionStore {
    executions: Arc<Mutex<Vec<PipelineExecution>>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, id: Uuid, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut PipelineExecution),
    {
        let mut executions = self
            .executions
            .lock()
            .expect("execution store lock poisoned");
        let execution = executions
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::ExecutionNotFound(id))?;
        apply(execution);
        Ok(())
    }

    // === Test Helpers ===

    /// Every execution row, in creation order.
    pub fn executions(&self) -> Vec<PipelineExecution> {
        self.executions
            .lock()
            .expect("execution store lock poisoned")
            .clone()
    }

    /// Execution rows created for one ruleset.
    pub fn for_ruleset(&self, name: &str) -> Vec<PipelineExecution> {
        self.executions()
            .into_iter()
            .filter(|e| e.ruleset_name == name)
            .collect()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create(&self, execution: &PipelineExecution) -> Result<(), StoreError> {
        self.executions
            .lock()
            .expect("execution store lock poisoned")
            .push(execution.clone());
        Ok(())
    }

    async fn record_step(&self, id: Uuid, record: &StepRecord) -> Result<(), StoreError> {
        self.update(id, |e| e.record_step(record.clone()))
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(id, |e| e.mark_completed())
    }

    async fn mark_partial(&self, id: Uuid, first_error: &str) -> Result<(), StoreError> {
        self.update(id, |e| e.mark_partial(first_error))
    }

    async fn mark_failed(&self, id: Uuid, step: &str, error: &str) -> Result<(), StoreError> {
        self.update(id, |e| e.mark_failed(step, error))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PipelineExecution>, StoreError> {
        Ok(self.executions().into_iter().find(|e| e.id == id))
    }

    async fn abandoned(&self, stale_after: Duration) -> Result<Vec<PipelineExecution>, StoreError> {
        let now = Utc::now();
        Ok(self
            .executions()
            .into_iter()
            .filter(|e| e.is_abandoned(now, stale_after))
            .collect())
    }
}
