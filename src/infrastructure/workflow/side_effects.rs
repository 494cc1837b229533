//! Detached dispatch of side effects

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::workflow::{ActionEvent, SideEffect};
use crate::infrastructure::observability::record_side_effect_failure;

/// Fires every registered side effect as its own background task.
///
/// Each effect is attempted once. Failures are logged and counted; they never
/// reach the run that produced the event, and the run never waits for them.
#[derive(Debug, Default, Clone)]
pub struct SideEffectDispatcher {
    effects: Vec<Arc<dyn SideEffect>>,
}

impl SideEffectDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_effect(mut self, effect: Arc<dyn SideEffect>) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Spawn one task per effect. The handles are only for callers that want
    /// to observe completion (tests); dropping them detaches the tasks.
    pub fn dispatch(&self, event: ActionEvent) -> Vec<JoinHandle<()>> {
        let event = Arc::new(event);

        self.effects
            .iter()
            .map(|effect| {
                let effect = effect.clone();
                let event = event.clone();

                tokio::spawn(async move {
                    match effect.apply(&event).await {
                        Ok(()) => debug!(
                            effect = effect.name(),
                            action = %event.action,
                            agent_id = %event.agent_id,
                            "Side effect applied"
                        ),
                        Err(e) => {
                            record_side_effect_failure(effect.name());
                            warn!(
                                effect = effect.name(),
                                action = %event.action,
                                agent_id = %event.agent_id,
                                error = %e,
                                "Side effect failed"
                            );
                        }
                    }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::mock::RecordingSideEffect;
    use crate::domain::{ActionId, AgentId, WorkflowKey, WorkflowTrigger};
    use chrono::Utc;
    use serde_json::Value;

    fn event() -> ActionEvent {
        ActionEvent {
            agent_id: AgentId::new("a1"),
            action: ActionId::new(ActionId::LIKE),
            trigger: WorkflowTrigger::schedule(WorkflowKey::FeedEngagement),
            subject_id: "p1".to_string(),
            params: Value::Null,
            output: Value::Null,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_every_effect_attempted_once() {
        let ok = RecordingSideEffect::new();
        let failing = RecordingSideEffect::failing();
        let dispatcher = SideEffectDispatcher::new()
            .with_effect(Arc::new(ok.clone()))
            .with_effect(Arc::new(failing.clone()));

        for handle in dispatcher.dispatch(event()) {
            // a failing effect must not panic its task
            handle.await.unwrap();
        }

        assert_eq!(ok.events().len(), 1);
        assert_eq!(failing.events().len(), 1);
    }

    #[tokio::test]
    async fn test_no_effects_spawns_nothing() {
        assert!(SideEffectDispatcher::new().dispatch(event()).is_empty());
    }
}
