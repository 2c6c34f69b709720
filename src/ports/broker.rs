//! Broker ports - partitioned log producer and consumer contracts.
//!
//! The core is broker-agnostic: any partitioned log with per-key
//! ordering and manual offset commit can sit behind these traits. The
//! production adapter speaks the Kafka wire protocol; tests use an
//! in-memory broker.

use async_trait::async_trait;

use crate::domain::BrokerError;

/// One record delivered by the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Partition key; the relay sets it to the document uuid.
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

/// Port for publishing records.
///
/// `publish` returns only after the broker durably acknowledged the
/// record with all-in-sync-replica durability; the relay marks outbox
/// entries published strictly after that ack.
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), BrokerError>;
}

/// Port for consuming records.
///
/// Implementations deliver records in partition order and expose a
/// manual commit cursor. Commit marks everything up to and including
/// the record's offset as processed for its partition.
#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    /// Waits for the next record. Returns `None` when the underlying
    /// stream is closed (in-memory broker drained and shut).
    async fn next_record(&self) -> Result<Option<BrokerRecord>, BrokerError>;

    /// Commits the record's offset for its partition.
    async fn commit(&self, record: &BrokerRecord) -> Result<(), BrokerError>;
}
