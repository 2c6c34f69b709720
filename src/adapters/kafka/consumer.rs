//! Kafka consumer adapter.
//!
//! A manual-commit member of the indexer's consumer group. Partition
//! assignment changes are logged through the rebalance callbacks so
//! operators can correlate processing gaps with group churn.

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{ClientConfig, ClientContext, Offset, TopicPartitionList};
use tracing::info;

use crate::config::BrokerConfig;
use crate::domain::BrokerError;
use crate::ports::{BrokerConsumer, BrokerRecord};

/// Logs group membership changes.
#[derive(Clone)]
struct RebalanceLogger;

impl ClientContext for RebalanceLogger {}

impl ConsumerContext for RebalanceLogger {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        info!(?rebalance, "consumer group rebalance starting");
    }

    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        info!(?rebalance, "consumer group rebalance complete");
    }
}

/// Partition-ordered record source with a manual commit cursor.
pub struct KafkaRecordConsumer {
    consumer: StreamConsumer<RebalanceLogger>,
}

impl KafkaRecordConsumer {
    /// Creates the group member and subscribes to the configured topic.
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer<RebalanceLogger> = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.as_str())
            .set("group.id", config.group_id.as_str())
            .set("client.id", "hermes-indexer-consumer")
            .set("auto.offset.reset", config.auto_offset_reset.as_str())
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .create_with_context(RebalanceLogger)
            .map_err(|e| BrokerError::Client(e.to_string()))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| BrokerError::Client(e.to_string()))?;

        Ok(Self { consumer })
    }
}

#[async_trait]
impl BrokerConsumer for KafkaRecordConsumer {
    async fn next_record(&self) -> Result<Option<BrokerRecord>, BrokerError> {
        let message = self
            .consumer
            .recv()
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        Ok(Some(BrokerRecord {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key()
                .map(|k| String::from_utf8_lossy(k).to_string()),
            payload: message.payload().unwrap_or_default().to_vec(),
        }))
    }

    async fn commit(&self, record: &BrokerRecord) -> Result<(), BrokerError> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &record.topic,
                record.partition,
                Offset::Offset(record.offset + 1),
            )
            .map_err(|e| BrokerError::Commit(e.to_string()))?;

        self.consumer
            .commit(&offsets, rdkafka::consumer::CommitMode::Async)
            .map_err(|e| BrokerError::Commit(e.to_string()))
    }
}
