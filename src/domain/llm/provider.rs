use async_trait::async_trait;
use std::fmt::Debug;

use super::{CompletionRequest, CompletionResponse, ProviderCapabilities, ProviderError};

/// A single LLM backend reachable over the network.
///
/// Each call targets exactly one named model; fallback across models is the
/// job of the completion service wrapping the provider.
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Send one chat completion request to `model`
    async fn chat(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Embed each text with `model`, returning one vector per input
    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;

    /// Declared capabilities, including the ordered supported-model list
    fn capabilities(&self) -> &ProviderCapabilities;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::llm::ProviderErrorKind;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Provider whose outcome is scripted per model; records every call
    #[derive(Debug)]
    pub struct ScriptedProvider {
        capabilities: ProviderCapabilities,
        outcomes: Mutex<HashMap<String, Result<String, ProviderErrorKind>>>,
        delays: Mutex<HashMap<String, Duration>>,
        calls: Mutex<Vec<(String, CompletionRequest)>>,
        embedding_error: Option<ProviderErrorKind>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self {
                capabilities: ProviderCapabilities::default(),
                outcomes: Mutex::new(HashMap::new()),
                delays: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                embedding_error: None,
            }
        }

        pub fn succeed(self, model: &str, content: &str) -> Self {
            self.outcomes
                .lock()
                .unwrap()
                .insert(model.to_string(), Ok(content.to_string()));
            self
        }

        pub fn fail(self, model: &str, kind: ProviderErrorKind) -> Self {
            self.outcomes
                .lock()
                .unwrap()
                .insert(model.to_string(), Err(kind));
            self
        }

        pub fn delay(self, model: &str, delay: Duration) -> Self {
            self.delays.lock().unwrap().insert(model.to_string(), delay);
            self
        }

        pub fn with_embedding_error(mut self, kind: ProviderErrorKind) -> Self {
            self.embedding_error = Some(kind);
            self
        }

        pub fn called_models(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(m, _)| m.clone())
                .collect()
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, r)| r.clone())
                .collect()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(
            &self,
            model: &str,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), request.clone()));

            let delay = self.delays.lock().unwrap().get(model).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let outcome = self.outcomes.lock().unwrap().get(model).cloned();
            match outcome {
                Some(Ok(content)) => Ok(CompletionResponse::new("mock-id", model, content)),
                Some(Err(kind)) => {
                    Err(ProviderError::new("mock", kind, format!("{} failed", model)))
                }
                None => Err(ProviderError::new(
                    "mock",
                    ProviderErrorKind::InvalidRequest,
                    format!("unknown model {}", model),
                )),
            }
        }

        async fn embed(
            &self,
            _model: &str,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, ProviderError> {
            if let Some(kind) = self.embedding_error {
                return Err(ProviderError::new("mock", kind, "embedding failed"));
            }

            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }

        fn capabilities(&self) -> &ProviderCapabilities {
            &self.capabilities
        }
    }
}
