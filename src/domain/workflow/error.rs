//! Workflow error types

use thiserror::Error;

use crate::domain::error::DomainError;
use crate::domain::llm::CompletionError;
use crate::domain::scope::ScopeViolation;

/// Errors surfaced to the caller of a handler, the router or the scheduler.
///
/// Failures inside a run (action errors, data-load errors, invalid decisions)
/// are recorded on the run state instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    ScopeViolation(#[from] ScopeViolation),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Handler '{handler}' failed: {message}")]
    Handler { handler: String, message: String },
}

impl WorkflowError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Configuration errors are never retried
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<DomainError> for WorkflowError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::NotFound(message),
            DomainError::Validation { message }
            | DomainError::Configuration { message }
            | DomainError::Credential { message } => Self::Configuration(message),
            DomainError::Storage { message } | DomainError::Cache { message } => {
                Self::Storage(message)
            }
            other => Self::handler("domain", other.to_string()),
        }
    }
}
