//! Broker configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Partitioned-log broker configuration (Kafka wire protocol)
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Comma-separated bootstrap servers, e.g. "kafka-1:9092,kafka-2:9092"
    pub brokers: String,

    /// Topic the relay publishes to and the consumer subscribes to
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Consumer group id; one group per logical indexer deployment
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Where a new consumer group starts reading: "earliest" or "latest"
    #[serde(default = "default_offset_reset")]
    pub auto_offset_reset: String,

    /// How long the producer waits for an all-replica ack
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
}

impl BrokerConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    /// Validate broker configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.brokers.is_empty() {
            return Err(ValidationError::MissingRequired("BROKER_BROKERS"));
        }
        if self.topic.is_empty() {
            return Err(ValidationError::MissingRequired("BROKER_TOPIC"));
        }
        if self.group_id.is_empty() {
            return Err(ValidationError::MissingRequired("BROKER_GROUP_ID"));
        }
        if !matches!(self.auto_offset_reset.as_str(), "earliest" | "latest") {
            return Err(ValidationError::InvalidOffsetReset);
        }
        if self.publish_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("publish_timeout_secs"));
        }
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: String::new(),
            topic: default_topic(),
            group_id: default_group_id(),
            auto_offset_reset: default_offset_reset(),
            publish_timeout_secs: default_publish_timeout(),
        }
    }
}

fn default_topic() -> String {
    "hermes.document-revisions".to_string()
}

fn default_group_id() -> String {
    "hermes-indexer".to_string()
}

fn default_offset_reset() -> String {
    "earliest".to_string()
}

fn default_publish_timeout() -> u64 {
    30
}
