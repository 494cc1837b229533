//! Provider error classification and the aggregated fallback error

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DomainError;

/// Classification of a failed provider call, used for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Unauthorized,
    RateLimited,
    ServerError,
    EmptyResponse,
    Timeout,
    InvalidRequest,
    Transport,
    Other,
}

impl ProviderErrorKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            429 => Self::RateLimited,
            400 | 404 | 409 | 413 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::EmptyResponse => "empty_response",
            Self::Timeout => "timeout",
            Self::InvalidRequest => "invalid_request",
            Self::Transport => "transport",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed call against one model
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{provider} [{kind}]: {message}")]
pub struct ProviderError {
    pub provider: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Unauthorized, message)
    }

    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::RateLimited, message)
    }

    pub fn server(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::ServerError, message)
    }

    pub fn empty_response(provider: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::EmptyResponse, "Model returned no content")
    }

    pub fn timeout(provider: impl Into<String>, timeout_ms: u64) -> Self {
        Self::new(
            provider,
            ProviderErrorKind::Timeout,
            format!("Request timed out after {}ms", timeout_ms),
        )
    }

    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Transport, message)
    }

    pub fn other(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Other, message)
    }
}

impl From<ProviderError> for DomainError {
    fn from(err: ProviderError) -> Self {
        DomainError::provider(err.provider, format!("[{}] {}", err.kind, err.message))
    }
}

/// One model's failure inside a fallback sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub model: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

/// Errors surfaced by the completion layer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompletionError {
    #[error("No candidate models available for completion")]
    NoCandidates,

    #[error("All {} candidate models failed; last error: {last}", failures.len())]
    FallbackExhausted {
        failures: Vec<ModelFailure>,
        last: ProviderError,
    },

    #[error("Embedding failed: {0}")]
    Embedding(ProviderError),
}

impl CompletionError {
    /// Models attempted, in order
    pub fn attempted_models(&self) -> Vec<&str> {
        match self {
            Self::FallbackExhausted { failures, .. } => {
                failures.iter().map(|f| f.model.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ProviderErrorKind::from_status(401), ProviderErrorKind::Unauthorized);
        assert_eq!(ProviderErrorKind::from_status(403), ProviderErrorKind::Unauthorized);
        assert_eq!(ProviderErrorKind::from_status(429), ProviderErrorKind::RateLimited);
        assert_eq!(ProviderErrorKind::from_status(503), ProviderErrorKind::ServerError);
        assert_eq!(ProviderErrorKind::from_status(400), ProviderErrorKind::InvalidRequest);
        assert_eq!(ProviderErrorKind::from_status(302), ProviderErrorKind::Other);
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::rate_limited("openai", "slow down");
        assert_eq!(err.to_string(), "openai [rate_limited]: slow down");
    }

    #[test]
    fn test_exhausted_error_reports_last_failure() {
        let err = CompletionError::FallbackExhausted {
            failures: vec![
                ModelFailure {
                    model: "a".into(),
                    kind: ProviderErrorKind::ServerError,
                    message: "boom".into(),
                },
                ModelFailure {
                    model: "b".into(),
                    kind: ProviderErrorKind::Timeout,
                    message: "slow".into(),
                },
            ],
            last: ProviderError::timeout("openai", 100),
        };

        assert_eq!(err.attempted_models(), vec!["a", "b"]);
        assert!(err.to_string().starts_with("All 2 candidate models failed"));
        assert!(err.to_string().contains("timeout"));
    }
}
