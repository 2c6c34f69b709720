//! IndexingStep port - the pluggable step contract.
//!
//! A step consumes a revision and produces a side effect in some
//! external system (search index, vector store, summary sink). Steps
//! classify their own failures at the boundary: a `StepError` is either
//! retryable (pipeline continues, redelivery retries) or permanent
//! (pipeline aborts). Step outputs must be keyed by
//! `(document_uuid, content_hash)` or equivalent so reprocessing a
//! redelivered record is idempotent.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::domain::{DocumentRevision, StepError};

/// Everything a step sees for one invocation.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub revision: DocumentRevision,
    /// The step's option bag from the matched ruleset (`null` when the
    /// ruleset configures nothing for this step).
    pub config: JsonValue,
}

impl StepContext {
    pub fn new(revision: DocumentRevision, config: JsonValue) -> Self {
        Self { revision, config }
    }

    /// Reads one option, falling back to `default` when absent.
    pub fn config_u64(&self, key: &str, default: u64) -> u64 {
        self.config
            .get(key)
            .and_then(JsonValue::as_u64)
            .unwrap_or(default)
    }
}

/// A registered unit of work in a ruleset pipeline.
#[async_trait]
pub trait IndexingStep: Send + Sync {
    /// The key rulesets use to name this step in their pipelines.
    fn name(&self) -> &'static str;

    /// Runs the step against one revision.
    ///
    /// Implementations classify failures via the returned error's kind;
    /// the executor treats an elapsed timeout as retryable on their
    /// behalf.
    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError>;
}
