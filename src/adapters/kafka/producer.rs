//! Kafka producer adapter.

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;

use crate::config::BrokerConfig;
use crate::domain::BrokerError;
use crate::ports::BrokerProducer;

/// Publishes outbox payloads to the configured topic.
///
/// `acks=all` plus idempotence: `publish` resolves only once every
/// in-sync replica has the record, and broker-side retries cannot
/// duplicate it. The relay marks outbox entries published strictly
/// after that ack.
pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaProducer {
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.as_str())
            .set("client.id", "hermes-indexer-relay")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "5")
            .create()
            .map_err(|e| BrokerError::Client(e.to_string()))?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            timeout: config.publish_timeout(),
        })
    }
}

#[async_trait]
impl BrokerProducer for KafkaProducer {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        self.producer
            .send(record, self.timeout)
            .await
            .map(|_| ())
            .map_err(|(e, _)| BrokerError::Publish {
                topic: self.topic.clone(),
                message: e.to_string(),
            })
    }
}
