//! In-memory control repository

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ControlRepository, ControlState, DomainError};

/// Single-process control store; every method holds the lock for its whole update
#[derive(Debug)]
pub struct InMemoryControlRepository {
    state: Mutex<ControlState>,
}

impl InMemoryControlRepository {
    pub fn new(budget_tokens: u64) -> Self {
        Self {
            state: Mutex::new(ControlState::new(budget_tokens)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ControlState>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::storage("Control state lock poisoned"))
    }
}

#[async_trait]
impl ControlRepository for InMemoryControlRepository {
    async fn get(&self) -> Result<ControlState, DomainError> {
        Ok(self.lock()?.clone())
    }

    async fn set_scheduler_enabled(&self, enabled: bool) -> Result<(), DomainError> {
        self.lock()?.scheduler_enabled = enabled;
        Ok(())
    }

    async fn set_agents_enabled(&self, enabled: bool) -> Result<(), DomainError> {
        self.lock()?.agents_enabled = enabled;
        Ok(())
    }

    async fn set_paused_until(&self, until: Option<DateTime<Utc>>) -> Result<(), DomainError> {
        self.lock()?.paused_until = until;
        Ok(())
    }

    async fn try_reserve_budget(&self, tokens: u64) -> Result<bool, DomainError> {
        Ok(self.lock()?.budget.try_reserve(tokens))
    }

    async fn settle_budget(&self, reserved: u64, actual: u64) -> Result<(), DomainError> {
        self.lock()?.budget.settle(reserved, actual);
        Ok(())
    }

    async fn reset_budget(&self, limit_tokens: Option<u64>) -> Result<(), DomainError> {
        self.lock()?.budget.reset(limit_tokens);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_flags_round_trip() {
        let repo = InMemoryControlRepository::new(1000);

        repo.set_scheduler_enabled(false).await.unwrap();
        repo.set_agents_enabled(false).await.unwrap();
        let until = Utc::now() + Duration::minutes(10);
        repo.set_paused_until(Some(until)).await.unwrap();

        let state = repo.get().await.unwrap();
        assert!(!state.scheduler_enabled);
        assert!(!state.agents_enabled);
        assert_eq!(state.paused_until, Some(until));

        repo.set_paused_until(None).await.unwrap();
        assert!(repo.get().await.unwrap().paused_until.is_none());
    }

    #[tokio::test]
    async fn test_reservations_never_exceed_limit() {
        let repo = Arc::new(InMemoryControlRepository::new(5000));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.try_reserve_budget(1000).await.unwrap()
            }));
        }

        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 5);
        assert_eq!(repo.get().await.unwrap().budget.remaining(), 0);
    }

    #[tokio::test]
    async fn test_settle_and_reset() {
        let repo = InMemoryControlRepository::new(2000);

        assert!(repo.try_reserve_budget(1500).await.unwrap());
        repo.settle_budget(1500, 300).await.unwrap();
        assert_eq!(repo.get().await.unwrap().budget.reserved_tokens, 300);

        repo.reset_budget(Some(500)).await.unwrap();
        let budget = repo.get().await.unwrap().budget;
        assert_eq!(budget.limit_tokens, 500);
        assert_eq!(budget.reserved_tokens, 0);
    }
}
