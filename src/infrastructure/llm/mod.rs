//! LLM provider implementations

mod factory;
mod fallback;
mod http_client;
mod openai;

pub use factory::LlmServiceFactory;
pub use fallback::ModelFallbackChain;
pub use http_client::{HttpClient, HttpClientTrait};
pub use openai::OpenAiProvider;
