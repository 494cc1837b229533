//! Agent Workflow Engine
//!
//! Runs LLM-backed social agents through scoped perceive/reason/act loops:
//! - event handlers and interval schedules start workflow runs
//! - every run sees only the data and actions its scope grants
//! - decisions go through a model fallback chain
//! - batches fan out to random agents under a per-cycle token budget

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use domain::{
    CompletionService, ControlRepository, DataDomain, DataTool, DomainError, ScheduleRepository,
};
use infrastructure::{
    cache::InMemoryCache,
    control::{InMemoryControlRepository, PostgresControlRepository},
    llm::LlmServiceFactory,
    schedule::{InMemoryScheduleRepository, PostgresScheduleRepository},
    services::{AdminService, AgentBatchProcessor, IntervalScheduler},
    social::{store_actions, ExperienceEffect, InMemorySocialStore, NotificationEffect},
    storage::PostgresConfig,
    workflow::{
        standard_handlers, CachedDataTool, LlmDecisionMaker, PerceiveReasonActOrchestrator,
        RunLoopConfig, ScopeBuilders, ScopeLimits, SideEffectDispatcher, SocialDataTool,
        ToolRegistry, WorkflowRegistry,
    },
};
use tracing::info;

use crate::config::StorageBackend;

/// Domains whose reads are shared across runs through the observation cache
const CACHED_DOMAINS: [DataDomain; 2] = [DataDomain::Posts, DataDomain::Communities];

/// Fully wired engine
#[derive(Debug, Clone)]
pub struct Engine {
    pub registry: Arc<WorkflowRegistry>,
    pub scheduler: Arc<IntervalScheduler>,
    pub admin: Arc<AdminService>,
    pub social: Arc<InMemorySocialStore>,
}

/// Build the engine with an empty social store and the configured LLM provider
pub async fn create_engine_with_config(config: &AppConfig) -> Result<Engine, DomainError> {
    create_engine_with_store(config, Arc::new(InMemorySocialStore::new())).await
}

/// Build the engine around an existing social store
pub async fn create_engine_with_store(
    config: &AppConfig,
    social: Arc<InMemorySocialStore>,
) -> Result<Engine, DomainError> {
    let completions = LlmServiceFactory::create(&config.llm)?;
    create_engine_with_services(config, social, completions).await
}

/// Build the engine with an explicit completion service
pub async fn create_engine_with_services(
    config: &AppConfig,
    social: Arc<InMemorySocialStore>,
    completions: Arc<dyn CompletionService>,
) -> Result<Engine, DomainError> {
    let (schedules, control) = create_repositories(config).await?;

    let tools = Arc::new(create_tool_registry(config, social.clone()));
    let effects = SideEffectDispatcher::new()
        .with_effect(Arc::new(ExperienceEffect::new(social.clone())))
        .with_effect(Arc::new(NotificationEffect::new(social.clone())));

    let orchestrator = Arc::new(
        PerceiveReasonActOrchestrator::new(tools, Arc::new(LlmDecisionMaker::new(completions)))
            .with_effects(effects)
            .with_config(RunLoopConfig {
                max_iterations: config.orchestrator.max_iterations,
            }),
    );

    let batch = Arc::new(AgentBatchProcessor::new(
        social.clone(),
        control.clone(),
        orchestrator,
        config.batch.clone(),
    ));
    let builders = Arc::new(ScopeBuilders::new(
        social.clone(),
        ScopeLimits::from(&config.orchestrator),
    ));

    let registry =
        Arc::new(WorkflowRegistry::new().with_handlers(standard_handlers(builders, batch)));

    let scheduler = Arc::new(IntervalScheduler::new(
        schedules.clone(),
        control.clone(),
        registry.clone(),
    ));
    let seeded = scheduler.seed_schedules(&config.scheduler.schedules).await?;

    let admin = Arc::new(AdminService::new(schedules, control, scheduler.clone()));

    info!(
        handlers = registry.keys().len(),
        seeded_schedules = seeded.len(),
        storage = ?config.storage.backend,
        "Engine ready"
    );

    Ok(Engine {
        registry,
        scheduler,
        admin,
        social,
    })
}

async fn create_repositories(
    config: &AppConfig,
) -> Result<(Arc<dyn ScheduleRepository>, Arc<dyn ControlRepository>), DomainError> {
    let budget = config.batch.cycle_budget_tokens;

    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory schedule and control storage");
            Ok((
                Arc::new(InMemoryScheduleRepository::new()),
                Arc::new(InMemoryControlRepository::new(budget)),
            ))
        }
        StorageBackend::Postgres => {
            let pool = PostgresConfig::from_storage(&config.storage)?.connect().await?;

            let schedules = PostgresScheduleRepository::new(pool.clone());
            schedules.ensure_table().await?;
            let control = PostgresControlRepository::new(pool);
            control.ensure_table(budget).await?;

            info!("Using PostgreSQL schedule and control storage");
            Ok((Arc::new(schedules), Arc::new(control)))
        }
    }
}

fn create_tool_registry(config: &AppConfig, social: Arc<InMemorySocialStore>) -> ToolRegistry {
    let cache = config
        .cache
        .enabled
        .then(|| Arc::new(InMemoryCache::from_config(&config.cache)));
    let ttl = Duration::from_secs(config.cache.ttl_secs);

    let mut registry = ToolRegistry::new();

    for tool in SocialDataTool::all(social.clone()) {
        let tool: Arc<dyn DataTool> = Arc::new(tool);
        let tool: Arc<dyn DataTool> = match &cache {
            Some(cache) if CACHED_DOMAINS.contains(&tool.domain()) => {
                Arc::new(CachedDataTool::new(tool, cache.clone(), ttl))
            }
            _ => tool,
        };
        registry = registry.with_data_tool(tool);
    }

    for action in store_actions(social) {
        registry = registry.with_action_tool(action);
    }

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockCompletionService;
    use crate::domain::social::{ConversationRecord, MessageRecord};
    use crate::domain::{EventKind, TriggerContext, TriggerKey, WorkflowKey};
    use chrono::Utc;

    fn seeded_store() -> Arc<InMemorySocialStore> {
        let store = Arc::new(InMemorySocialStore::new());
        store.add_agent("agent-1").unwrap();
        store
            .add_conversation(ConversationRecord {
                id: "c1".into(),
                participant_ids: vec!["user-1".into(), "agent-1".into()],
                is_group: false,
            })
            .unwrap();
        store
            .add_message(MessageRecord {
                id: "m1".into(),
                conversation_id: "c1".into(),
                sender_id: "user-1".into(),
                content: "hey, are you around?".into(),
                created_at: Utc::now(),
            })
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_engine_wires_every_handler_and_schedule() {
        let config = AppConfig::default();
        let engine = create_engine_with_services(
            &config,
            seeded_store(),
            Arc::new(MockCompletionService::new().answering(r#"{"action": "NOOP"}"#)),
        )
        .await
        .unwrap();

        for kind in EventKind::ALL {
            assert!(engine.registry.contains(TriggerKey::Event(kind)));
        }
        for key in WorkflowKey::ALL {
            assert!(engine.registry.contains(TriggerKey::Schedule(key)));
        }
        assert_eq!(
            engine.admin.list_schedules().await.unwrap().len(),
            config.scheduler.schedules.len()
        );
    }

    #[tokio::test]
    async fn test_chat_reply_end_to_end() {
        let store = seeded_store();
        let engine = create_engine_with_services(
            &AppConfig::default(),
            store.clone(),
            Arc::new(MockCompletionService::new().answering(
                r#"{"action": "REPLY", "params": {"content": "Yes, what's up?"}}"#,
            )),
        )
        .await
        .unwrap();

        let result = engine
            .registry
            .handle_event(
                EventKind::Chat,
                TriggerContext::new().with_agent("agent-1").with_message("m1"),
            )
            .await
            .unwrap();

        assert_eq!(result.runs.len(), 1);
        assert_eq!(result.executed_action_count(), 1);
        let journal = store.performed_actions().unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].action.as_str(), "REPLY");
    }

    #[tokio::test]
    async fn test_postgres_backend_requires_url() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Postgres;
        config.storage.database_url = None;

        let err = create_engine_with_services(
            &config,
            seeded_store(),
            Arc::new(MockCompletionService::new()),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DomainError::Configuration { .. }));
    }
}
