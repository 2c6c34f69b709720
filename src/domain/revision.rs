//! Document revision value types.
//!
//! A revision is an immutable snapshot of a document's content and
//! metadata, addressed by `(document_uuid, content_hash)`. Producers
//! insert revisions; nothing ever mutates one in place. Soft deletion
//! happens through the `status` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An immutable logical revision of a document.
///
/// `(document_uuid, content_hash)` is unique: re-observing the same
/// content for the same document returns the existing row instead of
/// inserting a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRevision {
    /// Monotonic surrogate id assigned by the store.
    pub id: i64,

    /// Stable, globally unique document identifier.
    pub document_uuid: Uuid,

    /// Provider-native document id (e.g. a Drive file id).
    pub document_id: String,

    /// Source provider, e.g. "google" or "notion".
    pub provider_type: String,

    /// Document title at the time of this revision.
    pub title: String,

    /// Content-address of the revision body.
    pub content_hash: String,

    /// Workflow status, e.g. "WIP", "Approved". Soft deletion is a
    /// status value, never a row delete.
    pub status: String,

    /// When the provider reported the document as modified.
    pub modified_time: DateTime<Utc>,

    /// When the store observed this revision.
    pub created_at: DateTime<Utc>,
}

/// Fields a producer supplies when recording a revision.
///
/// The store assigns `id` and `created_at` on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRevision {
    pub document_uuid: Uuid,
    pub document_id: String,
    pub provider_type: String,
    pub title: String,
    pub content_hash: String,
    pub status: String,
    pub modified_time: DateTime<Utc>,
}

impl NewRevision {
    /// Builds the stored revision from this input and store-assigned fields.
    pub fn into_revision(self, id: i64, created_at: DateTime<Utc>) -> DocumentRevision {
        DocumentRevision {
            id,
            document_uuid: self.document_uuid,
            document_id: self.document_id,
            provider_type: self.provider_type,
            title: self.title,
            content_hash: self.content_hash,
            status: self.status,
            modified_time: self.modified_time,
            created_at,
        }
    }
}

/// Lifecycle event attached to an outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

impl EventType {
    /// Stable string form used in outbox rows and idempotent keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::Updated => "updated",
            EventType::Deleted => "deleted",
        }
    }

    /// Parses the stable string form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(EventType::Created),
            "updated" => Some(EventType::Updated),
            "deleted" => Some(EventType::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_new_revision() -> NewRevision {
        NewRevision {
            document_uuid: Uuid::new_v4(),
            document_id: "drive-123".to_string(),
            provider_type: "google".to_string(),
            title: "Design Doc".to_string(),
            content_hash: "abc123".to_string(),
            status: "WIP".to_string(),
            modified_time: Utc::now(),
        }
    }

    #[test]
    fn into_revision_carries_all_fields() {
        let new = sample_new_revision();
        let uuid = new.document_uuid;
        let now = Utc::now();

        let revision = new.into_revision(42, now);

        assert_eq!(revision.id, 42);
        assert_eq!(revision.document_uuid, uuid);
        assert_eq!(revision.document_id, "drive-123");
        assert_eq!(revision.content_hash, "abc123");
        assert_eq!(revision.created_at, now);
    }

    #[test]
    fn event_type_round_trips_through_string_form() {
        for event_type in [EventType::Created, EventType::Updated, EventType::Deleted] {
            assert_eq!(EventType::parse(event_type.as_str()), Some(event_type));
        }
        assert_eq!(EventType::parse("renamed"), None);
    }

    #[test]
    fn event_type_serializes_lowercase() {
        let json = serde_json::to_string(&EventType::Deleted).unwrap();
        assert_eq!(json, "\"deleted\"");
    }
}
