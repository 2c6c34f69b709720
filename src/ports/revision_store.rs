//! RevisionStore port - content-addressed revision persistence.

use async_trait::async_trait;

use crate::domain::{DocumentRevision, NewRevision, StoreError};

/// Port for persisting document revisions.
///
/// Implementations must treat `(document_uuid, content_hash)` as the
/// revision identity: upserting a pair that already exists returns the
/// existing row untouched.
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Inserts the revision, or returns the existing row when the same
    /// content was already observed for this document.
    ///
    /// The boolean is `true` when a new row was created.
    async fn upsert(&self, new: NewRevision) -> Result<(DocumentRevision, bool), StoreError>;

    /// Looks a revision up by its surrogate id.
    async fn find_by_id(&self, id: i64) -> Result<Option<DocumentRevision>, StoreError>;
}
