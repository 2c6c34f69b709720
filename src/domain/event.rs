//! Wire envelope for revision events.
//!
//! The relay publishes one record per outbox entry: the record key is the
//! `document_uuid` (partition affinity gives per-document ordering) and
//! the value is the JSON envelope `{"revision": {...}, "metadata": {...}}`.
//! Consumers tolerate unknown fields so the envelope can grow.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::revision::{DocumentRevision, EventType};

/// Free-form metadata attached to an event by the producer.
///
/// Condition keys that are not revision fields resolve against this map,
/// so values keep their JSON types (numbers stay numbers).
pub type EventMetadata = serde_json::Map<String, JsonValue>;

/// The deserialized form of a broker record value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionEvent {
    pub revision: DocumentRevision,

    #[serde(default)]
    pub metadata: EventMetadata,

    /// Outbox entry id, stamped by the writer once the insert assigns
    /// one. Execution rows reference it; consumers of older envelopes
    /// see the default.
    #[serde(default)]
    pub outbox_id: i64,
}

impl RevisionEvent {
    pub fn new(revision: DocumentRevision, metadata: EventMetadata) -> Self {
        Self {
            revision,
            metadata,
            outbox_id: 0,
        }
    }

    /// Stamps the outbox id assigned to this event's entry.
    pub fn with_outbox_id(mut self, outbox_id: i64) -> Self {
        self.outbox_id = outbox_id;
        self
    }

    /// Record key: partitioning by document keeps one document's events
    /// in a single partition, observed in order by a single worker.
    pub fn partition_key(&self) -> String {
        self.revision.document_uuid.to_string()
    }

    /// Serializes the envelope for the outbox payload / record value.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserializes a record value. Unknown fields are ignored.
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// Derives the deduplication key for an outbox entry.
///
/// The key is a hash over `(document_uuid, content_hash, event_type)`, so
/// the same lifecycle observation of the same content maps to the same
/// outbox row no matter how many producers race to record it.
pub fn idempotent_key(document_uuid: Uuid, content_hash: &str, event_type: EventType) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_uuid.as_bytes());
    hasher.update(b":");
    hasher.update(content_hash.as_bytes());
    hasher.update(b":");
    hasher.update(event_type.as_str().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_revision() -> DocumentRevision {
        DocumentRevision {
            id: 7,
            document_uuid: Uuid::new_v4(),
            document_id: "doc-7".to_string(),
            provider_type: "google".to_string(),
            title: "RFC: partitioning".to_string(),
            content_hash: "h1".to_string(),
            status: "Approved".to_string(),
            modified_time: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn envelope_round_trips() {
        let revision = sample_revision();
        let mut metadata = EventMetadata::new();
        metadata.insert("document_type".to_string(), json!("RFC"));

        let event = RevisionEvent::new(revision.clone(), metadata);
        let payload = event.to_payload().unwrap();
        let decoded = RevisionEvent::from_payload(&payload).unwrap();

        assert_eq!(decoded.revision, revision);
        assert_eq!(decoded.metadata["document_type"], json!("RFC"));
    }

    #[test]
    fn envelope_tolerates_unknown_fields() {
        let revision = sample_revision();
        let mut value = serde_json::to_value(RevisionEvent::new(revision, EventMetadata::new()))
            .unwrap();
        value["future_field"] = json!({"nested": true});

        let decoded: RevisionEvent = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.revision.id, 7);
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let revision = sample_revision();
        let value = json!({ "revision": revision });

        let decoded: RevisionEvent = serde_json::from_value(value).unwrap();
        assert!(decoded.metadata.is_empty());
    }

    #[test]
    fn partition_key_is_document_uuid() {
        let revision = sample_revision();
        let uuid = revision.document_uuid;
        let event = RevisionEvent::new(revision, EventMetadata::new());

        assert_eq!(event.partition_key(), uuid.to_string());
    }

    #[test]
    fn idempotent_key_is_deterministic() {
        let uuid = Uuid::new_v4();

        let a = idempotent_key(uuid, "h1", EventType::Created);
        let b = idempotent_key(uuid, "h1", EventType::Created);

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn idempotent_key_separates_event_types_and_content() {
        let uuid = Uuid::new_v4();

        let created = idempotent_key(uuid, "h1", EventType::Created);
        let deleted = idempotent_key(uuid, "h1", EventType::Deleted);
        let other_content = idempotent_key(uuid, "h2", EventType::Created);

        assert_ne!(created, deleted);
        assert_ne!(created, other_content);
    }
}
