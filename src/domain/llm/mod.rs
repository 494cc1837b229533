//! LLM provider domain models and traits

mod capabilities;
mod error;
mod message;
mod provider;
mod request;
mod response;
mod service;

pub use capabilities::{LlmProviderSettings, ProviderCapabilities};
pub use error::{CompletionError, ModelFailure, ProviderError, ProviderErrorKind};
pub use message::{Message, MessageRole};
pub use provider::LlmProvider;
pub use request::{CompletionRequest, CompletionRequestBuilder, ToolDefinition};
pub use response::{CompletionResponse, FinishReason, ToolCall, Usage};
pub use service::CompletionService;

#[cfg(test)]
pub use provider::mock::ScriptedProvider;
#[cfg(test)]
pub use service::mock::MockCompletionService;
