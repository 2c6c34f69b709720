//! Built-in processing steps.
//!
//! Each step projects a revision into one external backend over HTTP:
//! full-text search, vector embeddings, or LLM summarization. Step
//! outputs are keyed by `document_uuid` (and chunk index for vectors),
//! which is what makes redelivered records safe to reprocess.

mod chunker;
mod content_fetcher;
mod embeddings;
mod llm_summary;
mod search_index;

pub use chunker::chunk_text;
pub use content_fetcher::HttpContentFetcher;
pub use embeddings::EmbeddingsStep;
pub use llm_summary::LlmSummaryStep;
pub use search_index::SearchIndexStep;

use crate::domain::StepError;

/// Maps an HTTP response status to the step error taxonomy.
///
/// Timeouts, throttling, and server errors are worth a retry; any other
/// client error means the request itself is wrong and a retry cannot
/// help.
pub(crate) fn classify_status(status: reqwest::StatusCode, context: &str) -> StepError {
    if status.as_u16() == 408 || status.as_u16() == 429 || status.is_server_error() {
        StepError::retryable(format!("{context}: backend returned {status}"))
    } else {
        StepError::permanent(format!("{context}: backend returned {status}"))
    }
}

/// Maps a transport-level failure. Network errors are always retryable.
pub(crate) fn classify_transport(error: reqwest::Error, context: &str) -> StepError {
    StepError::retryable(format!("{context}: {error}")).with_source(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::REQUEST_TIMEOUT,
        ] {
            assert!(classify_status(status, "t").is_retryable(), "{status}");
        }
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::NOT_FOUND,
            StatusCode::UNPROCESSABLE_ENTITY,
        ] {
            assert!(!classify_status(status, "t").is_retryable(), "{status}");
        }
    }
}
