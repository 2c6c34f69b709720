//! Error taxonomy shared across the pipeline.
//!
//! Step failures carry a classification tag the executor branches on:
//! retryable failures let the pipeline continue (redelivery retries the
//! whole execution), permanent failures abort it. Infrastructure errors
//! (store, broker) stay transient by nature and are retried at their own
//! layer. Poison payloads are handled at the consumer and never surface
//! here.

use std::error::Error;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Classification a step assigns to its failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepErrorKind {
    /// Transient: network, rate limit, timeout. Later steps still run
    /// and redelivery retries the execution.
    Retryable,
    /// The input or configuration is wrong; retrying cannot help.
    /// Aborts the pipeline.
    Permanent,
}

/// A classified step failure.
///
/// The executor only needs the tag; the execution store persists the
/// full message.
#[derive(Debug)]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl StepError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            kind: StepErrorKind::Retryable,
            message: message.into(),
            source: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: StepErrorKind::Permanent,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == StepErrorKind::Retryable
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn Error + 'static))
    }
}

/// Persistence-layer failures. Always transient from the pipeline's
/// point of view; callers back off and retry or rely on redelivery.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: {message}")]
    Backend {
        context: &'static str,
        message: String,
    },

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),
}

impl StoreError {
    /// Wraps a backend failure with the operation that hit it.
    pub fn backend(context: &'static str, source: impl fmt::Display) -> Self {
        StoreError::Backend {
            context,
            message: source.to_string(),
        }
    }
}

/// Broker adapter failures.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("publish to {topic} failed: {message}")]
    Publish { topic: String, message: String },

    #[error("consume failed: {0}")]
    Consume(String),

    #[error("offset commit failed: {0}")]
    Commit(String),

    #[error("broker client construction failed: {0}")]
    Client(String),
}

/// Ruleset load/validation failures. Detected at startup or reload;
/// a failed reload keeps the previous catalog serving.
#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("ruleset parse error: {0}")]
    Parse(String),

    #[error("ruleset {ruleset:?}: condition {key:?} is invalid: {reason}")]
    InvalidCondition {
        ruleset: String,
        key: String,
        reason: String,
    },

    #[error("ruleset {ruleset:?} names unregistered step {step:?}")]
    UnknownStep { ruleset: String, step: String },

    #[error("ruleset file unreadable: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_carries_classification() {
        assert!(StepError::retryable("rate limited").is_retryable());
        assert!(!StepError::permanent("schema violation").is_retryable());
    }

    #[test]
    fn step_error_exposes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out");
        let error = StepError::retryable("backend unreachable").with_source(io);

        assert_eq!(error.to_string(), "backend unreachable");
        assert!(error.source().is_some());
    }

    #[test]
    fn store_error_names_operation() {
        let error = StoreError::backend("insert outbox entry", "connection reset");
        assert_eq!(
            error.to_string(),
            "insert outbox entry: connection reset"
        );
    }
}
