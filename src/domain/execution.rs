//! Pipeline execution state machine.
//!
//! One `PipelineExecution` records the outcome of running one ruleset's
//! pipeline against one revision event. The row starts `running`, gains a
//! step record per executed step, and ends in exactly one of
//! `completed` (all steps succeeded), `partial` (retryable failures that
//! did not abort), or `failed` (a permanent error aborted the pipeline).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Overall state of a pipeline execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Partial,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Partial => "partial",
            ExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ExecutionStatus::Running),
            "completed" => Some(ExecutionStatus::Completed),
            "partial" => Some(ExecutionStatus::Partial),
            "failed" => Some(ExecutionStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
}

/// One entry in `step_results`, in pipeline order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub status: StepStatus,
    pub duration_ms: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn success(step: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            step: step.into(),
            status: StepStatus::Success,
            duration_ms,
            error: None,
        }
    }

    pub fn failed(step: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            status: StepStatus::Failed,
            duration_ms,
            error: Some(error.into()),
        }
    }
}

/// The recorded outcome of one (revision x ruleset) pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineExecution {
    pub id: Uuid,
    pub revision_id: i64,
    pub outbox_id: i64,
    pub ruleset_name: String,
    pub planned_steps: Vec<String>,
    pub step_results: Vec<StepRecord>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl PipelineExecution {
    /// Starts a new execution in `running` state with the ruleset's
    /// ordered plan.
    pub fn start(
        revision_id: i64,
        outbox_id: i64,
        ruleset_name: impl Into<String>,
        planned_steps: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            revision_id,
            outbox_id,
            ruleset_name: ruleset_name.into(),
            planned_steps,
            step_results: Vec::new(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
        }
    }

    /// Appends one step outcome. Step records stay in execution order so
    /// the recorded sequence is always a prefix of `planned_steps`.
    pub fn record_step(&mut self, record: StepRecord) {
        self.step_results.push(record);
    }

    /// All steps succeeded.
    pub fn mark_completed(&mut self) {
        self.finish(ExecutionStatus::Completed, None);
    }

    /// At least one retryable failure, no abort.
    pub fn mark_partial(&mut self, first_error: impl Into<String>) {
        self.finish(ExecutionStatus::Partial, Some(first_error.into()));
    }

    /// A permanent error aborted the pipeline at `step`.
    pub fn mark_failed(&mut self, step: &str, error: impl Into<String>) {
        let message = format!("{step}: {}", error.into());
        self.finish(ExecutionStatus::Failed, Some(message));
    }

    fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.finished_at = Some(Utc::now());
    }

    /// An execution still `running` after `stale_after` is abandoned:
    /// its process died mid-pipeline and redelivery of the originating
    /// outbox event will re-execute it.
    pub fn is_abandoned(&self, now: DateTime<Utc>, stale_after: chrono::Duration) -> bool {
        self.status == ExecutionStatus::Running && now - self.started_at > stale_after
    }

    /// Names of executed steps, in order.
    pub fn executed_steps(&self) -> Vec<&str> {
        self.step_results.iter().map(|r| r.step.as_str()).collect()
    }
}
