//! embeddings step - chunked vector indexing.
//!
//! Chunks the revision body, then hands the chunks to the embeddings
//! backend, which embeds and upserts vectors keyed by
//! `(document_uuid, chunk_ix)`. The key makes redelivery overwrite the
//! same vectors instead of accumulating duplicates.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;
use std::sync::Arc;

use super::{chunk_text, classify_status, classify_transport};
use crate::config::EmbeddingsConfig;
use crate::domain::StepError;
use crate::ports::{ContentFetcher, IndexingStep, StepContext};

/// Built-in vector-embedding step.
pub struct EmbeddingsStep {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    default_chunk_size: u64,
    default_overlap: u64,
    content: Arc<dyn ContentFetcher>,
}

impl EmbeddingsStep {
    pub fn new(
        config: &EmbeddingsConfig,
        content: Arc<dyn ContentFetcher>,
    ) -> Result<Self, StepError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StepError::permanent(format!("embeddings client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().clone()),
            default_chunk_size: config.chunk_size,
            default_overlap: config.overlap,
            content,
        })
    }
}

#[async_trait]
impl IndexingStep for EmbeddingsStep {
    fn name(&self) -> &'static str {
        "embeddings"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let revision = &ctx.revision;
        let body = self.content.fetch(revision).await?;

        let chunk_size = ctx.config_u64("chunk_size", self.default_chunk_size) as usize;
        let overlap = ctx.config_u64("overlap", self.default_overlap) as usize;

        let chunks: Vec<_> = chunk_text(&body, chunk_size, overlap)?
            .into_iter()
            .enumerate()
            .map(|(chunk_ix, text)| json!({ "chunk_ix": chunk_ix, "text": text }))
            .collect();

        if chunks.is_empty() {
            // Nothing to embed for an empty body; the upsert below would
            // be a no-op anyway.
            return Ok(());
        }

        let request_body = json!({
            "document_uuid": revision.document_uuid,
            "content_hash": revision.content_hash,
            "model": self.model,
            "chunks": chunks,
        });

        let url = format!("{}/v1/embeddings/upsert", self.endpoint);
        let mut request = self.client.post(&url).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(e, "upsert embeddings"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, "upsert embeddings"));
        }

        Ok(())
    }
}
