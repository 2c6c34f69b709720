//! In-memory content fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{DocumentRevision, StepError};
use crate::ports::ContentFetcher;

/// Serves revision bodies from a content-hash keyed map.
///
/// A revision whose hash has no stored body fails permanently, the same
/// verdict the HTTP adapter gives a missing blob.
#[derive(Clone, Default)]
pub struct InMemoryContentFetcher {
    bodies: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryContentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a body under its content hash.
    pub fn put(&self, content_hash: impl Into<String>, body: impl Into<String>) {
        self.bodies
            .lock()
            .expect("content lock poisoned")
            .insert(content_hash.into(), body.into());
    }
}

#[async_trait]
impl ContentFetcher for InMemoryContentFetcher {
    async fn fetch(&self, revision: &DocumentRevision) -> Result<String, StepError> {
        self.bodies
            .lock()
            .expect("content lock poisoned")
            .get(&revision.content_hash)
            .cloned()
            .ok_or_else(|| {
                StepError::permanent(format!(
                    "no content stored for hash {}",
                    revision.content_hash
                ))
            })
    }
}
