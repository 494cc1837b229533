//! Workflow registry - routes events and schedule keys to their handlers

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{
    EventKind, RunResult, TriggerContext, TriggerKey, WorkflowError, WorkflowHandler, WorkflowKey,
};

/// Handlers keyed by [`TriggerKey`]
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    handlers: HashMap<TriggerKey, Arc<dyn WorkflowHandler>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `key`, replacing any earlier registration
    pub fn register_handler(
        &mut self,
        key: impl Into<TriggerKey>,
        handler: Arc<dyn WorkflowHandler>,
    ) {
        let key = key.into();
        if let Some(previous) = self.handlers.insert(key, handler) {
            warn!(key = %key, previous = previous.name(), "Replaced workflow handler");
        }
    }

    pub fn with_handlers<I>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = (TriggerKey, Arc<dyn WorkflowHandler>)>,
    {
        for (key, handler) in handlers {
            self.register_handler(key, handler);
        }
        self
    }

    pub fn contains(&self, key: TriggerKey) -> bool {
        self.handlers.contains_key(&key)
    }

    /// Registered keys in a stable order
    pub fn keys(&self) -> Vec<TriggerKey> {
        let mut keys: Vec<TriggerKey> = self.handlers.keys().copied().collect();
        keys.sort();
        keys
    }

    pub async fn handle_event(
        &self,
        kind: EventKind,
        context: TriggerContext,
    ) -> Result<RunResult, WorkflowError> {
        self.dispatch(TriggerKey::Event(kind), context).await
    }

    pub async fn handle_schedule(
        &self,
        key: WorkflowKey,
        context: TriggerContext,
    ) -> Result<RunResult, WorkflowError> {
        self.dispatch(TriggerKey::Schedule(key), context).await
    }

    /// Dispatch a key read from storage; unknown strings are configuration errors
    pub async fn handle_schedule_str(
        &self,
        key: &str,
        context: TriggerContext,
    ) -> Result<RunResult, WorkflowError> {
        let key: WorkflowKey = key.parse()?;
        self.handle_schedule(key, context).await
    }

    async fn dispatch(
        &self,
        key: TriggerKey,
        context: TriggerContext,
    ) -> Result<RunResult, WorkflowError> {
        let handler = self.handlers.get(&key).ok_or_else(|| {
            WorkflowError::configuration(format!("No workflow handler registered for '{}'", key))
        })?;

        let result = handler.handle(context).await?;

        info!(
            key = %key,
            handler = handler.name(),
            runs = result.runs.len(),
            skipped = result.skipped.len(),
            actions = result.executed_action_count(),
            "Workflow handled"
        );

        Ok(result)
    }
}
