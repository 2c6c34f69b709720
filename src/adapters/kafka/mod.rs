//! Kafka-protocol broker adapters.
//!
//! Work against any partitioned log speaking the Kafka wire protocol
//! (Kafka, Redpanda, MSK). Producer publishes with all-replica acks;
//! consumer runs a manual-commit group member.

mod consumer;
mod producer;

pub use consumer::KafkaRecordConsumer;
pub use producer::KafkaProducer;
