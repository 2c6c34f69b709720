//! Domain layer - core types of the indexing pipeline.
//!
//! Everything here is free of I/O: revision and event value types, the
//! ruleset condition model and matcher, the pipeline-execution state
//! machine, and the error taxonomy shared across layers.

mod errors;
mod event;
mod execution;
mod revision;
mod ruleset;

pub use errors::{BrokerError, RulesetError, StepError, StepErrorKind, StoreError};
pub use event::{idempotent_key, EventMetadata, RevisionEvent};
pub use execution::{ExecutionStatus, PipelineExecution, StepRecord, StepStatus};
pub use revision::{DocumentRevision, EventType, NewRevision};
pub use ruleset::{Condition, ConditionOp, Ruleset, RulesetCatalog};
