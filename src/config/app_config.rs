use serde::Deserialize;

use crate::domain::WorkflowKey;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Prometheus exporter
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_addr")]
    pub listen_addr: String,
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: default_metrics_addr(),
        }
    }
}

/// OpenAI-compatible completion backend
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Falls back to `LLM__API_KEY`, then `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default)]
    pub fallback_models: Vec<String>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            default_model: default_model(),
            fallback_models: Vec::new(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
            max_tokens: None,
            temperature: None,
        }
    }
}

impl LlmConfig {
    /// Configured key, else `LLM__API_KEY`, else `OPENAI_API_KEY`
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("LLM__API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// Perceive/reason/act loop limits
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
    #[serde(default = "default_post_limit")]
    pub post_limit: usize,
    #[serde(default = "default_community_limit")]
    pub community_limit: usize,
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,
}

fn default_max_iterations() -> u32 {
    3
}

fn default_message_limit() -> usize {
    20
}

fn default_post_limit() -> usize {
    20
}

fn default_community_limit() -> usize {
    10
}

fn default_memory_limit() -> usize {
    10
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            message_limit: default_message_limit(),
            post_limit: default_post_limit(),
            community_limit: default_community_limit(),
            memory_limit: default_memory_limit(),
        }
    }
}

/// Fan-out of one trigger to several agents
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_min_agents")]
    pub min_agents: usize,
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Tokens reserved from the cycle budget before each run
    #[serde(default = "default_tokens_per_run")]
    pub estimated_tokens_per_run: u64,
    #[serde(default = "default_cycle_budget")]
    pub cycle_budget_tokens: u64,
}

fn default_min_agents() -> usize {
    1
}

fn default_max_agents() -> usize {
    5
}

fn default_max_concurrent() -> usize {
    3
}

fn default_tokens_per_run() -> u64 {
    2_000
}

fn default_cycle_budget() -> u64 {
    200_000
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_agents: default_min_agents(),
            max_agents: default_max_agents(),
            max_concurrent: default_max_concurrent(),
            estimated_tokens_per_run: default_tokens_per_run(),
            cycle_budget_tokens: default_cycle_budget(),
        }
    }
}

/// One interval schedule created at startup if missing
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSeed {
    pub workflow_key: WorkflowKey,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_schedules")]
    pub schedules: Vec<ScheduleSeed>,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    30
}

fn default_schedules() -> Vec<ScheduleSeed> {
    vec![
        ScheduleSeed {
            workflow_key: WorkflowKey::AgentActivityCycle,
            interval_seconds: 300,
        },
        ScheduleSeed {
            workflow_key: WorkflowKey::FeedEngagement,
            interval_seconds: 600,
        },
        ScheduleSeed {
            workflow_key: WorkflowKey::CommunityDiscovery,
            interval_seconds: 3_600,
        },
        ScheduleSeed {
            workflow_key: WorkflowKey::MemoryReflection,
            interval_seconds: 7_200,
        },
    ]
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
            schedules: default_schedules(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Observation cache for feed reads
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_cache_capacity() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            max_capacity: default_cache_capacity(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
