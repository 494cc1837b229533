//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, BatchConfig, CacheConfig, LlmConfig, LogFormat, LoggingConfig, MetricsConfig,
    OrchestratorConfig, ScheduleSeed, SchedulerConfig, StorageBackend, StorageConfig,
};
