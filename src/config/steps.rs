//! Step backend configuration
//!
//! Each built-in step talks to one external backend over HTTP. API keys
//! are held in `secrecy::Secret` so they never land in debug output.

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

fn endpoint_ok(endpoint: &str) -> bool {
    endpoint.starts_with("http://") || endpoint.starts_with("https://")
}

/// Search backend (full-text index) configuration
#[derive(Debug, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search provider
    pub endpoint: String,

    /// API key, if the provider requires one
    #[serde(default)]
    pub api_key: Option<Secret<String>>,

    /// Index documents are upserted into
    #[serde(default = "default_search_index")]
    pub index: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.endpoint.is_empty() {
            return Err(ValidationError::MissingRequired("STEPS_SEARCH_ENDPOINT"));
        }
        if !endpoint_ok(&self.endpoint) {
            return Err(ValidationError::InvalidEndpoint("search"));
        }
        Ok(())
    }
}

/// Embeddings backend configuration
#[derive(Debug, Deserialize)]
pub struct EmbeddingsConfig {
    /// Base URL of the embeddings provider
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<Secret<String>>,

    #[serde(default = "default_embeddings_model")]
    pub model: String,

    /// Default chunk window in characters; rulesets may override per
    /// step via `chunk_size`
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Default overlap between consecutive chunks
    #[serde(default = "default_overlap")]
    pub overlap: u64,

    #[serde(default = "default_embeddings_timeout")]
    pub timeout_secs: u64,
}

impl EmbeddingsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.endpoint.is_empty() {
            return Err(ValidationError::MissingRequired(
                "STEPS_EMBEDDINGS_ENDPOINT",
            ));
        }
        if !endpoint_ok(&self.endpoint) {
            return Err(ValidationError::InvalidEndpoint("embeddings"));
        }
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(ValidationError::InvalidChunking);
        }
        Ok(())
    }
}

/// LLM summarization backend configuration
#[derive(Debug, Deserialize)]
pub struct SummaryConfig {
    /// Base URL of the model provider
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<Secret<String>>,

    #[serde(default = "default_summary_model")]
    pub model: String,

    #[serde(default = "default_summary_timeout")]
    pub timeout_secs: u64,
}

impl SummaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.endpoint.is_empty() {
            return Err(ValidationError::MissingRequired("STEPS_SUMMARY_ENDPOINT"));
        }
        if !endpoint_ok(&self.endpoint) {
            return Err(ValidationError::InvalidEndpoint("summary"));
        }
        Ok(())
    }
}

/// Content storage configuration (revision bodies by content address)
#[derive(Debug, Deserialize)]
pub struct ContentConfig {
    /// Base URL of the document content service
    pub endpoint: String,

    #[serde(default = "default_content_timeout")]
    pub timeout_secs: u64,
}

impl ContentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.endpoint.is_empty() {
            return Err(ValidationError::MissingRequired("STEPS_CONTENT_ENDPOINT"));
        }
        if !endpoint_ok(&self.endpoint) {
            return Err(ValidationError::InvalidEndpoint("content"));
        }
        Ok(())
    }
}

/// Configuration for all step backends
#[derive(Debug, Deserialize)]
pub struct StepsConfig {
    pub search: SearchConfig,
    pub embeddings: EmbeddingsConfig,
    pub summary: SummaryConfig,
    pub content: ContentConfig,
}

impl StepsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.search.validate()?;
        self.embeddings.validate()?;
        self.summary.validate()?;
        self.content.validate()?;
        Ok(())
    }
}

fn default_search_index() -> String {
    "documents".to_string()
}

fn default_search_timeout() -> u64 {
    30
}

fn default_embeddings_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_chunk_size() -> u64 {
    1000
}

fn default_overlap() -> u64 {
    100
}

fn default_embeddings_timeout() -> u64 {
    60
}

fn default_summary_model() -> String {
    "claude-3-5-haiku-latest".to_string()
}

fn default_summary_timeout() -> u64 {
    120
}

fn default_content_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search(endpoint: &str) -> SearchConfig {
        SearchConfig {
            endpoint: endpoint.to_string(),
            api_key: None,
            index: default_search_index(),
            timeout_secs: default_search_timeout(),
        }
    }

    #[test]
    fn search_requires_http_endpoint() {
        assert!(search("").validate().is_err());
        assert!(search("ftp://search.local").validate().is_err());
        assert!(search("https://search.local").validate().is_ok());
    }

    #[test]
    fn embeddings_rejects_overlap_at_or_above_chunk_size() {
        let config = EmbeddingsConfig {
            endpoint: "https://embed.local".to_string(),
            api_key: None,
            model: default_embeddings_model(),
            chunk_size: 100,
            overlap: 100,
            timeout_secs: 60,
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidChunking)
        ));
    }
}
