//! ContentFetcher port - resolves a revision's body.
//!
//! Revisions are content-addressed; the body itself lives with the
//! document storage collaborator. Steps that need the text (embeddings,
//! summaries, full-text projection) fetch it through this port.

use async_trait::async_trait;

use crate::domain::{DocumentRevision, StepError};

/// Port for fetching the content a revision's `content_hash` addresses.
///
/// Failures are classified like any step failure: unreachable storage
/// is retryable, a missing blob for a committed revision is permanent.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, revision: &DocumentRevision) -> Result<String, StepError>;
}
