//! In-memory partitioned broker for testing.
//!
//! Mimics the production broker's contract: records are partitioned by
//! key, delivered in partition order, and committed manually. Close the
//! broker to make the consumer drain and observe end-of-stream.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::domain::BrokerError;
use crate::ports::{BrokerConsumer, BrokerProducer, BrokerRecord};

struct Shared {
    pending: Vec<VecDeque<BrokerRecord>>,
    next_offsets: Vec<i64>,
    /// Every record ever published, for test assertions.
    published: Vec<BrokerRecord>,
    /// Highest committed offset (exclusive) per partition.
    committed: HashMap<i32, i64>,
    closed: bool,
}

impl Shared {
    fn pop_next(&mut self) -> Option<BrokerRecord> {
        self.pending.iter_mut().find_map(VecDeque::pop_front)
    }

    fn drained(&self) -> bool {
        self.pending.iter().all(VecDeque::is_empty)
    }
}

/// In-memory broker acting as both producer and consumer endpoint.
pub struct InMemoryBroker {
    topic: String,
    shared: Mutex<Shared>,
    notify: Notify,
}

impl InMemoryBroker {
    pub fn new(topic: impl Into<String>, partitions: usize) -> Self {
        assert!(partitions > 0, "broker needs at least one partition");
        Self {
            topic: topic.into(),
            shared: Mutex::new(Shared {
                pending: vec![VecDeque::new(); partitions],
                next_offsets: vec![0; partitions],
                published: Vec::new(),
                committed: HashMap::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    fn partition_for(&self, key: &str, partitions: usize) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % partitions
    }

    /// No more records will arrive; the consumer drains and then sees
    /// end-of-stream.
    pub fn close(&self) {
        self.shared.lock().expect("broker lock poisoned").closed = true;
        // notify_one stores a permit when nobody is waiting, so a
        // consumer arriving later still wakes immediately.
        self.notify.notify_one();
    }

    // === Test Helpers ===

    /// Every record published so far, in publish order.
    pub fn published_records(&self) -> Vec<BrokerRecord> {
        self.shared
            .lock()
            .expect("broker lock poisoned")
            .published
            .clone()
    }

    /// Records published under one key, in publish order.
    pub fn records_for_key(&self, key: &str) -> Vec<BrokerRecord> {
        self.published_records()
            .into_iter()
            .filter(|r| r.key.as_deref() == Some(key))
            .collect()
    }

    /// Committed offset (exclusive) for a partition, if any.
    pub fn committed_offset(&self, partition: i32) -> Option<i64> {
        self.shared
            .lock()
            .expect("broker lock poisoned")
            .committed
            .get(&partition)
            .copied()
    }

    /// Total records with a committed offset at or past them.
    pub fn committed_count(&self) -> usize {
        let shared = self.shared.lock().expect("broker lock poisoned");
        shared
            .published
            .iter()
            .filter(|r| {
                shared
                    .committed
                    .get(&r.partition)
                    .is_some_and(|committed| r.offset < *committed)
            })
            .count()
    }
}

#[async_trait]
impl BrokerProducer for InMemoryBroker {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let mut shared = self.shared.lock().expect("broker lock poisoned");
        if shared.closed {
            return Err(BrokerError::Publish {
                topic: self.topic.clone(),
                message: "broker closed".to_string(),
            });
        }

        let partition = self.partition_for(key, shared.pending.len());
        let offset = shared.next_offsets[partition];
        shared.next_offsets[partition] = offset + 1;

        let record = BrokerRecord {
            topic: self.topic.clone(),
            partition: partition as i32,
            offset,
            key: Some(key.to_string()),
            payload: payload.to_vec(),
        };

        shared.pending[partition].push_back(record.clone());
        shared.published.push(record);
        drop(shared);

        self.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl BrokerConsumer for InMemoryBroker {
    async fn next_record(&self) -> Result<Option<BrokerRecord>, BrokerError> {
        loop {
            let notified = self.notify.notified();
            {
                let mut shared = self.shared.lock().expect("broker lock poisoned");
                if let Some(record) = shared.pop_next() {
                    return Ok(Some(record));
                }
                if shared.closed && shared.drained() {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    async fn commit(&self, record: &BrokerRecord) -> Result<(), BrokerError> {
        let mut shared = self.shared.lock().expect("broker lock poisoned");
        let cursor = shared.committed.entry(record.partition).or_insert(0);
        *cursor = (*cursor).max(record.offset + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_with_same_key_share_a_partition_in_order() {
        let broker = InMemoryBroker::new("t", 4);

        broker.publish("doc-a", b"1").await.unwrap();
        broker.publish("doc-b", b"2").await.unwrap();
        broker.publish("doc-a", b"3").await.unwrap();

        let for_a = broker.records_for_key("doc-a");
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].partition, for_a[1].partition);
        assert!(for_a[0].offset < for_a[1].offset);
    }

    #[tokio::test]
    async fn consumer_drains_then_sees_end_of_stream_after_close() {
        let broker = InMemoryBroker::new("t", 2);
        broker.publish("k", b"1").await.unwrap();
        broker.close();

        let first = broker.next_record().await.unwrap();
        assert!(first.is_some());
        assert!(broker.next_record().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_advances_partition_cursor_monotonically() {
        let broker = InMemoryBroker::new("t", 1);
        broker.publish("k", b"1").await.unwrap();
        broker.publish("k", b"2").await.unwrap();

        let r1 = broker.next_record().await.unwrap().unwrap();
        let r2 = broker.next_record().await.unwrap().unwrap();

        broker.commit(&r2).await.unwrap();
        broker.commit(&r1).await.unwrap();

        assert_eq!(broker.committed_offset(0), Some(2));
        assert_eq!(broker.committed_count(), 2);
    }
}
