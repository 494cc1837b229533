//! Static provider configuration and declared capabilities

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// What a provider declares it can do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub streaming: bool,
    pub tools: bool,
    pub vision: bool,
    pub max_tokens: u32,
    /// Supported models in preferred fallback order
    pub models: Vec<String>,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            streaming: false,
            tools: false,
            vision: false,
            max_tokens: 4096,
            models: Vec::new(),
        }
    }
}

impl ProviderCapabilities {
    pub fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Immutable settings a provider is constructed with
#[derive(Debug, Clone)]
pub struct LlmProviderSettings {
    api_key: String,
    base_url: Option<String>,
    default_model: String,
    fallback_models: Vec<String>,
    embedding_model: String,
    timeout: Duration,
    default_max_tokens: Option<u32>,
    default_temperature: Option<f32>,
}

impl LlmProviderSettings {
    /// Create settings; an empty credential is a fatal configuration error
    pub fn new(
        api_key: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let api_key = api_key.into();

        if api_key.trim().is_empty() {
            return Err(DomainError::credential("LLM provider API key is required"));
        }

        Ok(Self {
            api_key,
            base_url: None,
            default_model: default_model.into(),
            fallback_models: Vec::new(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout: Duration::from_secs(30),
            default_max_tokens: None,
            default_temperature: None,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_max_tokens(mut self, tokens: u32) -> Self {
        self.default_max_tokens = Some(tokens);
        self
    }

    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Default model followed by the configured fallbacks
    pub fn fallback_order(&self) -> Vec<String> {
        std::iter::once(self.default_model.clone())
            .chain(self.fallback_models.iter().cloned())
            .collect()
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn default_max_tokens(&self) -> Option<u32> {
        self.default_max_tokens
    }

    pub fn default_temperature(&self) -> Option<f32> {
        self.default_temperature
    }
}
