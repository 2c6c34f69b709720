//! Outbox delivery guarantees: exactly-once keys, relay coordination,
//! per-document ordering, and retention pruning.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use async_trait::async_trait;
use hermes_indexer::adapters::memory::{InMemoryBroker, InMemoryOutbox};
use hermes_indexer::application::OutboxRelay;
use hermes_indexer::config::RelayConfig;
use hermes_indexer::domain::{
    BrokerError, DocumentRevision, EventMetadata, EventType, RevisionEvent,
};
use hermes_indexer::ports::BrokerProducer;

fn revision(id: i64, uuid: Uuid, hash: &str) -> DocumentRevision {
    DocumentRevision {
        id,
        document_uuid: uuid,
        document_id: format!("doc-{id}"),
        provider_type: "google".to_string(),
        title: "T".to_string(),
        content_hash: hash.to_string(),
        status: "WIP".to_string(),
        modified_time: Utc::now(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn concurrent_publishers_produce_exactly_one_entry() {
    let outbox = Arc::new(InMemoryOutbox::new());
    let shared = revision(1, Uuid::new_v4(), "h");

    // Many producers race to record the same observation; none sees an
    // error, exactly one inserts.
    let mut handles = Vec::new();
    for _ in 0..16 {
        let outbox = outbox.clone();
        let revision = shared.clone();
        handles.push(tokio::spawn(async move {
            outbox
                .append(&revision, EventType::Created, &EventMetadata::new())
                .unwrap()
        }));
    }

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(outbox.entries().len(), 1);
}

#[tokio::test]
async fn distinct_event_types_get_distinct_entries() {
    let outbox = InMemoryOutbox::new();
    let shared = revision(1, Uuid::new_v4(), "h");

    for event_type in [EventType::Created, EventType::Updated, EventType::Deleted] {
        outbox
            .append(&shared, event_type, &EventMetadata::new())
            .unwrap();
        // A second observation of the same lifecycle event dedupes.
        outbox
            .append(&shared, event_type, &EventMetadata::new())
            .unwrap();
    }

    assert_eq!(outbox.entries().len(), 3);
}

#[tokio::test]
async fn every_pending_entry_is_eventually_published_once() {
    let outbox = Arc::new(InMemoryOutbox::new());
    let broker = Arc::new(InMemoryBroker::new("t", 4));

    let mut uuids = Vec::new();
    for id in 1..=25 {
        let uuid = Uuid::new_v4();
        uuids.push(uuid);
        outbox
            .append(
                &revision(id, uuid, &format!("h{id}")),
                EventType::Created,
                &EventMetadata::new(),
            )
            .unwrap();
    }

    let config = RelayConfig {
        batch_size: 10,
        ..Default::default()
    };
    let relay = OutboxRelay::new(outbox.clone(), broker.clone(), config);

    while outbox.pending_count() > 0 {
        relay.process_batch().await.unwrap();
    }

    assert_eq!(outbox.published_count(), 25);
    assert_eq!(broker.published_records().len(), 25);
    for uuid in uuids {
        assert_eq!(broker.records_for_key(&uuid.to_string()).len(), 1);
    }
}

#[tokio::test]
async fn same_document_events_keep_outbox_order_on_the_wire() {
    let outbox = Arc::new(InMemoryOutbox::new());
    let broker = Arc::new(InMemoryBroker::new("t", 4));
    let uuid = Uuid::new_v4();

    for (id, hash) in [(1, "h1"), (2, "h2"), (3, "h3")] {
        outbox
            .append(&revision(id, uuid, hash), EventType::Created, &EventMetadata::new())
            .unwrap();
    }

    let relay = OutboxRelay::new(outbox.clone(), broker.clone(), RelayConfig::default());
    while outbox.pending_count() > 0 {
        relay.process_batch().await.unwrap();
    }

    let records = broker.records_for_key(&uuid.to_string());
    let hashes: Vec<String> = records
        .iter()
        .map(|r| {
            RevisionEvent::from_payload(&r.payload)
                .unwrap()
                .revision
                .content_hash
        })
        .collect();

    // Same key -> same partition, offsets ascending in outbox id order.
    assert_eq!(hashes, ["h1", "h2", "h3"]);
    assert!(records.windows(2).all(|w| w[0].offset < w[1].offset));
}

/// Producer that counts publishes per idempotent key.
struct CountingProducer {
    counts: Mutex<HashMap<String, usize>>,
}

#[async_trait]
impl BrokerProducer for CountingProducer {
    async fn publish(&self, key: &str, _payload: &[u8]) -> Result<(), BrokerError> {
        *self
            .counts
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default() += 1;
        Ok(())
    }
}

#[tokio::test]
async fn competing_relays_never_double_publish() {
    let outbox = Arc::new(InMemoryOutbox::new());
    let producer = Arc::new(CountingProducer {
        counts: Mutex::new(HashMap::new()),
    });

    for id in 1..=40 {
        outbox
            .append(
                &revision(id, Uuid::new_v4(), &format!("h{id}")),
                EventType::Created,
                &EventMetadata::new(),
            )
            .unwrap();
    }

    let config = RelayConfig {
        batch_size: 8,
        ..Default::default()
    };
    let relay_a = Arc::new(OutboxRelay::new(outbox.clone(), producer.clone(), config.clone()));
    let relay_b = Arc::new(OutboxRelay::new(outbox.clone(), producer.clone(), config));

    // Two relay instances drain the same outbox concurrently; claims
    // make their batches disjoint.
    while outbox.pending_count() > 0 {
        let a = {
            let relay = relay_a.clone();
            tokio::spawn(async move { relay.process_batch().await.unwrap() })
        };
        let b = {
            let relay = relay_b.clone();
            tokio::spawn(async move { relay.process_batch().await.unwrap() })
        };
        a.await.unwrap();
        b.await.unwrap();
    }

    assert_eq!(outbox.published_count(), 40);
    let counts = producer.counts.lock().unwrap();
    assert_eq!(counts.len(), 40);
    assert!(counts.values().all(|&count| count == 1));
}

#[tokio::test]
async fn pruning_removes_only_old_published_entries() {
    use hermes_indexer::ports::OutboxQueue;

    let outbox = Arc::new(InMemoryOutbox::new());
    let broker = Arc::new(InMemoryBroker::new("t", 1));

    outbox
        .append(&revision(1, Uuid::new_v4(), "h1"), EventType::Created, &EventMetadata::new())
        .unwrap();
    outbox
        .append(&revision(2, Uuid::new_v4(), "h2"), EventType::Created, &EventMetadata::new())
        .unwrap();

    let relay = OutboxRelay::new(outbox.clone(), broker, RelayConfig::default());
    relay.process_batch().await.unwrap();

    // Pending entries never prune, however old.
    outbox
        .append(&revision(3, Uuid::new_v4(), "h3"), EventType::Created, &EventMetadata::new())
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let pruned = outbox
        .prune_published(chrono::Duration::zero())
        .await
        .unwrap();

    assert_eq!(pruned, 2);
    assert_eq!(outbox.entries().len(), 1);
    assert_eq!(outbox.pending_count(), 1);
}

#[tokio::test]
async fn envelope_round_trips_through_the_wire() {
    let outbox = Arc::new(InMemoryOutbox::new());
    let broker = Arc::new(InMemoryBroker::new("t", 1));

    let uuid = Uuid::new_v4();
    let mut metadata = EventMetadata::new();
    metadata.insert("document_type".to_string(), serde_json::json!("RFC"));
    metadata.insert("content_length".to_string(), serde_json::json!(9000));

    let outbox_id = outbox
        .append(&revision(7, uuid, "h7"), EventType::Created, &metadata)
        .unwrap()
        .expect("entry should insert");

    let relay = OutboxRelay::new(outbox.clone(), broker.clone(), RelayConfig::default());
    relay.process_batch().await.unwrap();

    let records = broker.published_records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key.as_deref(), Some(uuid.to_string().as_str()));

    let event = RevisionEvent::from_payload(&records[0].payload).unwrap();
    assert_eq!(event.revision.document_uuid, uuid);
    assert_eq!(event.outbox_id, outbox_id);
    assert_eq!(event.metadata["document_type"], serde_json::json!("RFC"));
    assert_eq!(event.metadata["content_length"], serde_json::json!(9000));
}
