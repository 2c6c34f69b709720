//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the pipeline core and the outside world. Adapters implement them.
//!
//! ## Persistence Ports
//!
//! - `RevisionStore` - content-addressed revision upserts
//! - `OutboxQueue` / `OutboxClaim` - locked batch claims for the relay
//! - `ExecutionStore` - pipeline-execution rows and transitions
//!
//! ## Broker Ports
//!
//! - `BrokerProducer` - keyed publish with full-durability acks
//! - `BrokerConsumer` - partition-ordered records with manual commit
//!
//! ## Step Ports
//!
//! - `IndexingStep` - pluggable processing step contract
//! - `ContentFetcher` - resolves a revision's body by content address

mod broker;
mod content_fetcher;
mod execution_store;
mod outbox;
mod revision_store;
mod step;

pub use broker::{BrokerConsumer, BrokerProducer, BrokerRecord};
pub use content_fetcher::ContentFetcher;
pub use execution_store::ExecutionStore;
pub use outbox::{OutboxClaim, OutboxEntry, OutboxQueue};
pub use revision_store::RevisionStore;
pub use step::{IndexingStep, StepContext};
