//! Application layer - the services that drive the pipeline.
//!
//! - `StepRegistry` - name-keyed registry of processing steps
//! - `RulesetHandle` - atomically swappable ruleset snapshot
//! - `PipelineExecutor` - runs one ruleset's pipeline for one event
//! - `OutboxRelay` - moves outbox entries to the broker
//! - `ConsumerSupervisor` - group consumption, dispatch, offset commits

mod consumer;
mod executor;
mod relay;
mod rulesets;
mod step_registry;

pub use consumer::ConsumerSupervisor;
pub use executor::{ExecutionError, PipelineExecutor};
pub use relay::OutboxRelay;
pub use rulesets::RulesetHandle;
pub use step_registry::StepRegistry;
