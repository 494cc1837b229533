//! Completion service - the resilient interface the engine talks to

use async_trait::async_trait;
use std::fmt::Debug;

use super::{CompletionError, CompletionRequest, CompletionResponse};

/// Completion layer used by decision makers.
///
/// Implementations hide model fallback: a successful response names the
/// model that actually answered.
#[async_trait]
pub trait CompletionService: Send + Sync + Debug {
    /// Complete a request, falling back across models as configured
    async fn complete(&self, request: CompletionRequest)
    -> Result<CompletionResponse, CompletionError>;

    /// Embed texts with the single designated embedding model
    async fn embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CompletionError>;

    /// Whether credentials and at least one model are configured
    fn is_configured(&self) -> bool;

    /// Cheap round-trip against the backend
    async fn health_check(&self) -> bool;
}
