//! Observation cache wrapping a data tool

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::workflow::DataTool;
use crate::domain::{Cache, CacheExt, CacheKey, DataDomain, DomainError, DomainQuery, WorkflowScope};

/// Serves repeated identical queries from the cache for `ttl`.
///
/// Keys cover the query; relationship reads also cover the observer since the
/// answer depends on who is looking. Cache failures fall through to the inner tool.
#[derive(Debug)]
pub struct CachedDataTool {
    inner: Arc<dyn DataTool>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl CachedDataTool {
    pub fn new(inner: Arc<dyn DataTool>, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }

    pub fn namespace(domain: DataDomain) -> String {
        format!("observation:{}", domain)
    }

    fn key(&self, scope: &WorkflowScope, query: &DomainQuery) -> Result<CacheKey, DomainError> {
        let observer = match query {
            DomainQuery::Relationships { .. } => Some(scope.actor().id.as_str()),
            _ => None,
        };

        CacheKey::new(&Self::namespace(self.inner.domain()), &(query, observer))
    }
}

#[async_trait]
impl DataTool for CachedDataTool {
    fn domain(&self) -> DataDomain {
        self.inner.domain()
    }

    async fn load(&self, scope: &WorkflowScope, query: &DomainQuery) -> Result<Value, DomainError> {
        let key = match self.key(scope, query) {
            Ok(key) => key,
            Err(e) => {
                warn!(domain = %self.domain(), error = %e, "Cannot build observation cache key");
                return self.inner.load(scope, query).await;
            }
        };

        match self.cache.get::<Value>(key.as_str()).await {
            Ok(Some(value)) => {
                debug!(key = %key, "Observation cache hit");
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Observation cache read failed"),
        }

        let value = self.inner.load(scope, query).await?;

        if let Err(e) = self.cache.set(key.as_str(), &value, self.ttl).await {
            warn!(key = %key, error = %e, "Observation cache write failed");
        }

        Ok(value)
    }
}
