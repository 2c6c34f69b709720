//! PostgreSQL adapters.
//!
//! The revision, outbox, and execution tables live here, plus the
//! transactional write path producers call.

mod execution_store;
mod ingest;
mod outbox;
mod revision_store;

pub use execution_store::PostgresExecutionStore;
pub use ingest::RevisionIngest;
pub use outbox::{publish_revision_event, PostgresOutboxQueue};
pub use revision_store::PostgresRevisionStore;
