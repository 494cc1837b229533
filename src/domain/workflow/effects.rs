//! Side effects fired after a successful action (notifications, XP, missions)

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::error::DomainError;
use crate::domain::scope::{ActionId, AgentId, WorkflowTrigger};

/// A successfully executed action, as seen by side effects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionEvent {
    pub agent_id: AgentId,
    pub action: ActionId,
    pub trigger: WorkflowTrigger,
    pub subject_id: String,
    pub params: Value,
    pub output: Value,
    pub occurred_at: DateTime<Utc>,
}

/// Cross-cutting reaction to an action. Attempted once in the background;
/// a failure is logged and never reaches the run.
#[async_trait]
pub trait SideEffect: Send + Sync + Debug {
    fn name(&self) -> &str;

    async fn apply(&self, event: &ActionEvent) -> Result<(), DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Default)]
    pub struct RecordingSideEffect {
        events: Arc<Mutex<Vec<ActionEvent>>>,
        fail: bool,
    }

    impl RecordingSideEffect {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn events(&self) -> Vec<ActionEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SideEffect for RecordingSideEffect {
        fn name(&self) -> &str {
            "recording"
        }

        async fn apply(&self, event: &ActionEvent) -> Result<(), DomainError> {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                return Err(DomainError::internal("notification service down"));
            }
            Ok(())
        }
    }
}
