//! llm_summary step - model-generated summaries.
//!
//! Calls the configured model with the revision body and persists the
//! summary onto the search document for the same `document_uuid`, so a
//! redelivered record regenerates and overwrites rather than appending.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{classify_status, classify_transport};
use crate::config::{SearchConfig, SummaryConfig};
use crate::domain::StepError;
use crate::ports::{ContentFetcher, IndexingStep, StepContext};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u64 = 512;

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// Built-in summarization step.
pub struct LlmSummaryStep {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    search_endpoint: String,
    search_index: String,
    search_api_key: Option<String>,
    content: Arc<dyn ContentFetcher>,
}

impl LlmSummaryStep {
    pub fn new(
        config: &SummaryConfig,
        search: &SearchConfig,
        content: Arc<dyn ContentFetcher>,
    ) -> Result<Self, StepError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| StepError::permanent(format!("summary client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().clone()),
            search_endpoint: search.endpoint.trim_end_matches('/').to_string(),
            search_index: search.index.clone(),
            search_api_key: search
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().clone()),
            content,
        })
    }

    async fn summarize(&self, title: &str, body: &str, max_tokens: u64) -> Result<String, StepError> {
        let prompt = format!(
            "Summarize the following document in a short paragraph.\n\nTitle: {title}\n\n{body}"
        );

        let request_body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let url = format!("{}/v1/messages", self.endpoint);
        let mut request = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION)
            .json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(e, "generate summary"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, "generate summary"));
        }

        let message: MessageResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(e, "decode summary response"))?;

        let summary: String = message
            .content
            .into_iter()
            .map(|block| block.text)
            .collect();

        if summary.is_empty() {
            return Err(StepError::retryable("model returned an empty summary"));
        }

        Ok(summary)
    }

    async fn persist(&self, ctx: &StepContext, summary: &str) -> Result<(), StepError> {
        let url = format!(
            "{}/indexes/{}/documents/{}",
            self.search_endpoint, self.search_index, ctx.revision.document_uuid
        );

        let mut request = self.client.patch(&url).json(&json!({
            "summary": summary,
            "content_hash": ctx.revision.content_hash,
        }));
        if let Some(key) = &self.search_api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport(e, "persist summary"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, "persist summary"));
        }

        Ok(())
    }
}

#[async_trait]
impl IndexingStep for LlmSummaryStep {
    fn name(&self) -> &'static str {
        "llm_summary"
    }

    async fn execute(&self, ctx: &StepContext) -> Result<(), StepError> {
        let body = self.content.fetch(&ctx.revision).await?;
        let max_tokens = ctx.config_u64("max_tokens", DEFAULT_MAX_TOKENS);

        let summary = self.summarize(&ctx.revision.title, &body, max_tokens).await?;
        self.persist(ctx, &summary).await
    }
}
