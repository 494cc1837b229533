use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{DomainError, ProviderError, ProviderErrorKind};

const PROVIDER: &str = "http";

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    /// POST a JSON body; non-2xx statuses come back as classified errors
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &Value,
    ) -> Result<Value, ProviderError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_transport(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::new(
            PROVIDER,
            ProviderErrorKind::Timeout,
            format!("Request timed out: {}", err),
        )
    } else {
        ProviderError::transport(PROVIDER, format!("Request failed: {}", err))
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &Value,
    ) -> Result<Value, ProviderError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                PROVIDER,
                ProviderErrorKind::from_status(status.as_u16()),
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        response.json().await.map_err(|e| {
            ProviderError::other(PROVIDER, format!("Failed to parse response: {}", e))
        })
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct MockHttpClient {
        responses: RwLock<HashMap<String, Value>>,
        errors: RwLock<HashMap<String, ProviderErrorKind>>,
        bodies: RwLock<Vec<Value>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(self, url: impl Into<String>, response: Value) -> Self {
            self.responses.write().unwrap().insert(url.into(), response);
            self
        }

        pub fn with_error(self, url: impl Into<String>, kind: ProviderErrorKind) -> Self {
            self.errors.write().unwrap().insert(url.into(), kind);
            self
        }

        /// Request bodies seen so far
        pub fn bodies(&self) -> Vec<Value> {
            self.bodies.read().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClientTrait for MockHttpClient {
        async fn post_json(
            &self,
            url: &str,
            _headers: Vec<(&str, &str)>,
            body: &Value,
        ) -> Result<Value, ProviderError> {
            self.bodies.write().unwrap().push(body.clone());

            if let Some(kind) = self.errors.read().unwrap().get(url) {
                return Err(ProviderError::new("mock", *kind, "mock failure"));
            }

            self.responses
                .read()
                .unwrap()
                .get(url)
                .cloned()
                .ok_or_else(|| {
                    ProviderError::other("mock", format!("No mock response for {}", url))
                })
        }
    }
}
