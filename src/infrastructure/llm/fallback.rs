//! Ordered model fallback over a single provider

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::domain::llm::ModelFailure;
use crate::domain::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService, LlmProvider,
    LlmProviderSettings, ProviderError,
};
use crate::infrastructure::observability::{record_llm_attempt, record_llm_tokens};

/// Completion service trying each candidate model once, in order.
///
/// Candidates are the requested model (if any) followed by the settings'
/// fallback order, without duplicates. Every attempt is bounded by the
/// per-attempt timeout.
#[derive(Debug)]
pub struct ModelFallbackChain {
    provider: Arc<dyn LlmProvider>,
    settings: LlmProviderSettings,
}

impl ModelFallbackChain {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: LlmProviderSettings) -> Self {
        Self { provider, settings }
    }

    pub fn settings(&self) -> &LlmProviderSettings {
        &self.settings
    }

    /// Ordered, de-duplicated candidate models
    pub fn candidates(&self, requested: Option<&str>) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();

        let requested = requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        for model in requested.into_iter().chain(self.settings.fallback_order()) {
            if !candidates.contains(&model) {
                candidates.push(model);
            }
        }

        candidates
    }

    /// Fill unset sampling parameters from the settings; set ones are untouched
    fn with_defaults(&self, mut request: CompletionRequest) -> CompletionRequest {
        if request.max_tokens.is_none() {
            request.max_tokens = self.settings.default_max_tokens();
        }
        if request.temperature.is_none() {
            request.temperature = self.settings.default_temperature();
        }
        request
    }

    async fn attempt(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let limit = self.settings.timeout();

        match timeout(limit, self.provider.chat(model, request)).await {
            Ok(Ok(response)) if response.is_empty() => {
                Err(ProviderError::empty_response(self.provider.provider_name()))
            }
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout(
                self.provider.provider_name(),
                limit.as_millis() as u64,
            )),
        }
    }
}

#[async_trait]
impl CompletionService for ModelFallbackChain {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        let candidates = self.candidates(request.model.as_deref());
        let request = self.with_defaults(request);

        let mut failures = Vec::with_capacity(candidates.len());
        let mut last_error = None;

        for model in &candidates {
            let start = Instant::now();
            debug!(model = %model, "Attempting completion");

            match self.attempt(model, &request).await {
                Ok(mut response) => {
                    record_llm_attempt(model, "success", start.elapsed());
                    record_llm_tokens(model, response.total_tokens());

                    if !failures.is_empty() {
                        info!(
                            model = %model,
                            failed_attempts = failures.len(),
                            "Completion succeeded on fallback model"
                        );
                    }

                    response.model = model.clone();
                    return Ok(response);
                }
                Err(err) => {
                    record_llm_attempt(model, err.kind.as_str(), start.elapsed());
                    warn!(
                        model = %model,
                        kind = %err.kind,
                        error = %err.message,
                        "Completion attempt failed"
                    );

                    failures.push(ModelFailure {
                        model: model.clone(),
                        kind: err.kind,
                        message: err.message.clone(),
                    });
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => Err(CompletionError::FallbackExhausted { failures, last }),
            None => Err(CompletionError::NoCandidates),
        }
    }

    async fn embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CompletionError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.settings.embedding_model();
        let limit = self.settings.timeout();

        match timeout(limit, self.provider.embed(model, texts)).await {
            Ok(Ok(vectors)) => Ok(vectors),
            Ok(Err(err)) => {
                warn!(model = %model, kind = %err.kind, "Embedding failed");
                Err(CompletionError::Embedding(err))
            }
            Err(_) => Err(CompletionError::Embedding(ProviderError::timeout(
                self.provider.provider_name(),
                limit.as_millis() as u64,
            ))),
        }
    }

    fn is_configured(&self) -> bool {
        !self.settings.api_key().trim().is_empty()
    }

    async fn health_check(&self) -> bool {
        let request = CompletionRequest::builder()
            .user("ping")
            .max_tokens(1)
            .build();

        self.attempt(self.settings.default_model(), &request)
            .await
            .is_ok()
    }
}
