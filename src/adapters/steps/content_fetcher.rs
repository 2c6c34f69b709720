//! HTTP implementation of ContentFetcher.
//!
//! Fetches revision bodies from the document content service by
//! content address.

use async_trait::async_trait;
use reqwest::Client;

use super::{classify_status, classify_transport};
use crate::config::ContentConfig;
use crate::domain::{DocumentRevision, StepError};
use crate::ports::ContentFetcher;

/// Content-service client.
pub struct HttpContentFetcher {
    client: Client,
    endpoint: String,
}

impl HttpContentFetcher {
    pub fn new(config: &ContentConfig) -> Result<Self, StepError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StepError::permanent(format!("content client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, revision: &DocumentRevision) -> Result<String, StepError> {
        let url = format!(
            "{}/documents/{}/content/{}",
            self.endpoint, revision.document_uuid, revision.content_hash
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport(e, "fetch content"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, "fetch content"));
        }

        response
            .text()
            .await
            .map_err(|e| classify_transport(e, "read content body"))
    }
}
