use std::sync::Arc;
use std::time::Duration;

use super::fallback::ModelFallbackChain;
use super::http_client::HttpClient;
use super::OpenAiProvider;
use crate::config::LlmConfig;
use crate::domain::{CompletionService, DomainError, LlmProvider, LlmProviderSettings};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Builds the completion stack from configuration
#[derive(Debug)]
pub struct LlmServiceFactory;

impl LlmServiceFactory {
    /// Provider settings; a missing API key is a fatal credential error
    pub fn settings(config: &LlmConfig) -> Result<LlmProviderSettings, DomainError> {
        let api_key = config.resolve_api_key().unwrap_or_default();

        let mut settings = LlmProviderSettings::new(api_key, &config.default_model)?
            .with_fallback_models(config.fallback_models.clone())
            .with_embedding_model(&config.embedding_model)
            .with_timeout(Duration::from_secs(config.timeout_secs.max(1)));

        if let Some(base_url) = &config.base_url {
            settings = settings.with_base_url(base_url);
        }
        if let Some(max_tokens) = config.max_tokens {
            settings = settings.with_default_max_tokens(max_tokens);
        }
        if let Some(temperature) = config.temperature {
            settings = settings.with_default_temperature(temperature);
        }

        Ok(settings)
    }

    /// OpenAI-compatible provider declaring the configured models
    pub fn create_provider(
        settings: &LlmProviderSettings,
    ) -> Result<Arc<dyn LlmProvider>, DomainError> {
        // The per-attempt timeout is enforced by the chain; the transport limit
        // only guards against connections the chain has already abandoned.
        let client = HttpClient::with_timeout(settings.timeout() * 2)?;
        let base_url = settings.base_url().unwrap_or(DEFAULT_OPENAI_BASE_URL);

        let provider = OpenAiProvider::with_base_url(client, settings.api_key(), base_url)
            .with_models(settings.fallback_order());

        Ok(Arc::new(provider))
    }

    /// Provider wrapped in the model fallback chain
    pub fn create(config: &LlmConfig) -> Result<Arc<dyn CompletionService>, DomainError> {
        let settings = Self::settings(config)?;
        let provider = Self::create_provider(&settings)?;

        tracing::info!(
            default_model = %settings.default_model(),
            candidates = settings.fallback_order().len(),
            "LLM completion service configured"
        );

        Ok(Arc::new(ModelFallbackChain::new(provider, settings)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: &str) -> LlmConfig {
        LlmConfig {
            api_key: Some(api_key.to_string()),
            default_model: "gpt-4o-mini".to_string(),
            fallback_models: vec!["gpt-4o".to_string()],
            max_tokens: Some(256),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_settings_from_config() {
        let settings = LlmServiceFactory::settings(&config("sk-test")).unwrap();

        assert_eq!(settings.fallback_order(), vec!["gpt-4o-mini", "gpt-4o"]);
        assert_eq!(settings.default_max_tokens(), Some(256));
        assert_eq!(settings.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_provider_declares_fallback_models() {
        let settings = LlmServiceFactory::settings(&config("sk-test")).unwrap();
        let provider = LlmServiceFactory::create_provider(&settings).unwrap();

        assert_eq!(provider.provider_name(), "openai");
        assert!(provider.capabilities().supports_model("gpt-4o"));
    }

    #[test]
    fn test_create_service() {
        let service = LlmServiceFactory::create(&config("sk-test")).unwrap();
        assert!(service.is_configured());
    }
}
