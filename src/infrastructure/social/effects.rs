//! Side effects backed by the in-memory store

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::in_memory::{InMemorySocialStore, Notification};
use crate::domain::workflow::{ActionEvent, SideEffect};
use crate::domain::{ActionId, DomainError};

/// Awards experience points to the acting agent
#[derive(Debug)]
pub struct ExperienceEffect {
    store: Arc<InMemorySocialStore>,
}

impl ExperienceEffect {
    pub fn new(store: Arc<InMemorySocialStore>) -> Self {
        Self { store }
    }

    fn points(action: &ActionId) -> u64 {
        match action.as_str() {
            ActionId::COMMENT | ActionId::REPLY => 10,
            ActionId::JOIN_COMMUNITY | ActionId::SUPPORT | ActionId::OPPOSE => 5,
            ActionId::FOLLOW | ActionId::CHEER | ActionId::SAVE_MEMORY => 3,
            ActionId::LIKE => 1,
            _ => 0,
        }
    }
}

#[async_trait]
impl SideEffect for ExperienceEffect {
    fn name(&self) -> &str {
        "experience"
    }

    async fn apply(&self, event: &ActionEvent) -> Result<(), DomainError> {
        let points = Self::points(&event.action);
        if points == 0 {
            return Ok(());
        }

        let total = self
            .store
            .award_experience(event.agent_id.as_str(), points)?;
        debug!(agent_id = %event.agent_id, points, total, "Awarded experience");
        Ok(())
    }
}

/// Tells the subject's owner that an agent interacted with it
#[derive(Debug)]
pub struct NotificationEffect {
    store: Arc<InMemorySocialStore>,
}

impl NotificationEffect {
    pub fn new(store: Arc<InMemorySocialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SideEffect for NotificationEffect {
    fn name(&self) -> &str {
        "notification"
    }

    async fn apply(&self, event: &ActionEvent) -> Result<(), DomainError> {
        if event.action.as_str() == ActionId::IGNORE {
            return Ok(());
        }

        self.store.notify(Notification {
            actor_id: event.agent_id.as_str().to_string(),
            action: event.action.clone(),
            subject_id: event.subject_id.clone(),
            created_at: event.occurred_at,
        })
    }
}
