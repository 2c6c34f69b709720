//! search_index step - full-text projection into the search backend.
//!
//! Projects the revision (plus its body) into the search provider's
//! document schema and upserts by `document_uuid`, so reprocessing a
//! redelivered record overwrites rather than duplicates.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;

use super::{classify_status, classify_transport};
use crate::config::SearchConfig;
use crate::domain::StepError;
use crate::ports::{ContentFetcher, IndexingStep, StepContext};

/// Built-in full-text indexing step.
pub struct SearchIndexStep {
    client: Client,
    endpoint: String,
    index: String,
    api_key: Option<String>,
    content: Arc<dyn ContentFetcher>,
}

impl SearchIndexStep {
    pub fn new(config: &SearchConfig, content: Arc<dyn ContentFetcher>) -> Result<Self, StepError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StepError::permanent(format!("search client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            api_key: config
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().clone()),
            content,
        })
    }
}

#[async_trait]
impl IndexingStep for SearchIndexStep {
    fn name(&self) -> &'static str {
        "search_index"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let revision = &ctx.revision;
        let body = self.content.fetch(revision).await?;

        // Rulesets may point a pipeline at a different index.
        let index = ctx
            .config
            .get("index")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.index);

        let document = json!({
            "document_uuid": revision.document_uuid,
            "document_id": revision.document_id,
            "provider_type": revision.provider_type,
            "title": revision.title,
            "status": revision.status,
            "content_hash": revision.content_hash,
            "modified_time": revision.modified_time,
            "body": body,
        });

        let url = format!(
            "{}/indexes/{}/documents/{}",
            self.endpoint, index, revision.document_uuid
        );

        let mut request = self.client.put(&url).json(&document);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(e, "upsert search document"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, "upsert search document"));
        }

        Ok(())
    }
}
