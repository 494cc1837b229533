//! Control repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::automock;

use super::ControlState;
use crate::domain::error::DomainError;

/// Store for global flags and the cycle budget.
///
/// Every mutation is an atomic read-modify-write in the store.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlRepository: Send + Sync {
    async fn get(&self) -> Result<ControlState, DomainError>;

    async fn set_scheduler_enabled(&self, enabled: bool) -> Result<(), DomainError>;

    async fn set_agents_enabled(&self, enabled: bool) -> Result<(), DomainError>;

    /// `None` lifts the pause
    async fn set_paused_until(&self, until: Option<DateTime<Utc>>) -> Result<(), DomainError>;

    /// Reserve tokens from the cycle budget; `false` when it cannot cover them
    async fn try_reserve_budget(&self, tokens: u64) -> Result<bool, DomainError>;

    /// Replace a reservation with the tokens actually used
    async fn settle_budget(&self, reserved: u64, actual: u64) -> Result<(), DomainError>;

    /// Start a new cycle, optionally with a new limit
    async fn reset_budget(&self, limit_tokens: Option<u64>) -> Result<(), DomainError>;
}
