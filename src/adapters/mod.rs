//! Adapters - Implementations of the ports.
//!
//! - `postgres` - sqlx-backed stores and the transactional write path
//! - `kafka` - partitioned-log producer/consumer (Kafka wire protocol)
//! - `steps` - built-in HTTP processing steps
//! - `memory` - in-memory adapters for tests

pub mod kafka;
pub mod memory;
pub mod postgres;
pub mod steps;
