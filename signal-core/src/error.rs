//! Error types for the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend error ({backend}, retryable={retryable}): {message}")]
    Backend {
        backend: String,
        message: String,
        retryable: bool,
    },

    #[error("Malformed extraction: {0}")]
    MalformedExtraction(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Ticker registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignalError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        SignalError::InvalidInput(msg.into())
    }

    /// Transient backend failure (network, timeout, rate limit, 5xx)
    pub fn backend_retryable(backend: impl Into<String>, message: impl Into<String>) -> Self {
        SignalError::Backend {
            backend: backend.into(),
            message: message.into(),
            retryable: true,
        }
    }

    /// Permanent backend failure (bad credentials, unknown model, rejected request)
    pub fn backend_fatal(backend: impl Into<String>, message: impl Into<String>) -> Self {
        SignalError::Backend {
            backend: backend.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        SignalError::MalformedExtraction(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        SignalError::Cancelled(msg.into())
    }

    pub fn registry_unavailable(msg: impl Into<String>) -> Self {
        SignalError::RegistryUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        SignalError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        SignalError::Internal(msg.into())
    }

    /// Whether the orchestrator may retry the failed call
    pub fn is_retryable(&self) -> bool {
        matches!(self, SignalError::Backend { retryable: true, .. })
    }

    /// Errors that terminate a whole run instead of a single article
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            SignalError::Backend {
                retryable: false,
                ..
            } | SignalError::RegistryUnavailable(_)
                | SignalError::Config(_)
                | SignalError::Internal(_)
        )
    }

    /// Classification recorded in the raw log for per-article failures
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            SignalError::InvalidInput(_) => FailureKind::InvalidInput,
            SignalError::Backend { .. } => FailureKind::Backend,
            SignalError::MalformedExtraction(_) => FailureKind::MalformedExtraction,
            SignalError::Cancelled(_) => FailureKind::Cancelled,
            SignalError::RegistryUnavailable(_)
            | SignalError::Config(_)
            | SignalError::Internal(_) => FailureKind::Internal,
        }
    }
}

/// Kind of per-article failure kept in the raw log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    Backend,
    MalformedExtraction,
    /// The run was cancelled before the article's next backend call
    Cancelled,
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::Backend => "backend",
            FailureKind::MalformedExtraction => "malformed_extraction",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Internal => "internal",
        };
        write!(f, "{}", name)
    }
}

/// Result type alias for pipeline operations
pub type SignalResult<T> = Result<T, SignalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let transient = SignalError::backend_retryable("ollama", "connection refused");
        assert!(transient.is_retryable());
        assert!(!transient.is_fatal_to_run());

        let auth = SignalError::backend_fatal("openai", "invalid api key");
        assert!(!auth.is_retryable());
        assert!(auth.is_fatal_to_run());
    }

    #[test]
    fn test_per_article_errors_are_not_fatal() {
        assert!(!SignalError::invalid_input("empty").is_fatal_to_run());
        assert!(!SignalError::malformed("no json").is_fatal_to_run());
        assert!(!SignalError::cancelled("stopped").is_fatal_to_run());
        assert!(!SignalError::cancelled("stopped").is_retryable());
        assert!(SignalError::registry_unavailable("missing").is_fatal_to_run());
    }

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(
            SignalError::malformed("x").failure_kind(),
            FailureKind::MalformedExtraction
        );
        assert_eq!(
            SignalError::backend_retryable("gemini", "timeout").failure_kind(),
            FailureKind::Backend
        );
        assert_eq!(
            SignalError::cancelled("stopped").failure_kind(),
            FailureKind::Cancelled
        );
        assert_eq!(FailureKind::MalformedExtraction.to_string(), "malformed_extraction");
    }
}
