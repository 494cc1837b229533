use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::http_client::HttpClientTrait;
use crate::domain::llm::ToolCall;
use crate::domain::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Message, ProviderCapabilities,
    ProviderError, Usage,
};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const PROVIDER: &str = "openai";

/// OpenAI-compatible chat/embeddings provider
#[derive(Debug)]
pub struct OpenAiProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
    capabilities: ProviderCapabilities,
}

impl<C: HttpClientTrait> OpenAiProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
            capabilities: ProviderCapabilities {
                streaming: false,
                tools: true,
                vision: false,
                max_tokens: 16_384,
                models: vec![
                    "gpt-4o".to_string(),
                    "gpt-4o-mini".to_string(),
                    "gpt-4-turbo".to_string(),
                    "gpt-3.5-turbo".to_string(),
                ],
            },
        }
    }

    /// Replace the declared supported-model list (ordered)
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.capabilities.models = models;
        self
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn build_request(&self, model: &str, request: &CompletionRequest) -> Value {
        let messages: Vec<OpenAiMessage> =
            request.messages.iter().map(OpenAiMessage::from_domain).collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }

        if let Some(ref stop) = request.stop {
            body["stop"] = json!(stop);
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        if request.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        body
    }

    fn parse_response(&self, json: Value) -> Result<CompletionResponse, ProviderError> {
        let response: OpenAiResponse = serde_json::from_value(json).map_err(|e| {
            ProviderError::other(PROVIDER, format!("Failed to parse response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::empty_response(PROVIDER))?;

        let mut completion = CompletionResponse::new(
            response.id,
            response.model,
            choice.message.content.unwrap_or_default(),
        );

        if let Some(reason) = choice.finish_reason {
            completion = completion.with_finish_reason(FinishReason::parse(&reason));
        }

        if let Some(usage) = response.usage {
            completion =
                completion.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }

        for call in choice.message.tool_calls {
            // Arguments arrive as a JSON-encoded string
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            completion = completion.with_tool_call(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            });
        }

        if completion.is_empty() {
            return Err(ProviderError::empty_response(PROVIDER));
        }

        Ok(completion)
    }
}

fn relabel(err: ProviderError) -> ProviderError {
    ProviderError {
        provider: PROVIDER.to_string(),
        ..err
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for OpenAiProvider<C> {
    async fn chat(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_request(model, request);
        let response = self
            .client
            .post_json(&self.chat_completions_url(), self.headers(), &body)
            .await
            .map_err(relabel)?;

        self.parse_response(response)
    }

    async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let body = json!({
            "model": model,
            "input": texts,
        });

        let response = self
            .client
            .post_json(&self.embeddings_url(), self.headers(), &body)
            .await
            .map_err(relabel)?;

        let mut parsed: OpenAiEmbeddingResponse = serde_json::from_value(response).map_err(|e| {
            ProviderError::other(PROVIDER, format!("Failed to parse embeddings: {}", e))
        })?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::other(
                PROVIDER,
                format!(
                    "Expected {} embeddings, got {}",
                    texts.len(),
                    parsed.data.len()
                ),
            ));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAiMessage {
    fn from_domain(message: &Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.clone(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    id: String,
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}
