//! PostgreSQL connection pooling

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::StorageConfig;
use crate::domain::DomainError;

/// PostgreSQL pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/agent_workflows".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Settings from the `storage` section; the URL is required there
    pub fn from_storage(config: &StorageConfig) -> Result<Self, DomainError> {
        let url = config
            .database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                DomainError::configuration(
                    "storage.database_url is required for the postgres backend",
                )
            })?;

        Ok(Self::new(url).with_max_connections(config.max_connections.max(1)))
    }

    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(self.idle_timeout_secs))
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!(max_connections = self.max_connections, "Connected to PostgreSQL");
        Ok(pool)
    }
}

/// Bind helper for unsigned values stored as BIGINT
pub(crate) fn to_bigint(value: u64, field: &str) -> Result<i64, DomainError> {
    i64::try_from(value)
        .map_err(|_| DomainError::validation(format!("{} is too large: {}", field, value)))
}

/// Read helper for BIGINT columns holding unsigned values
pub(crate) fn from_bigint(value: i64, field: &str) -> Result<u64, DomainError> {
    u64::try_from(value)
        .map_err(|_| DomainError::storage(format!("Negative {} in database: {}", field, value)))
}
