//! Global control flags and the per-cycle budget

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token budget for one batch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleBudget {
    pub limit_tokens: u64,
    pub reserved_tokens: u64,
}

impl CycleBudget {
    pub fn new(limit_tokens: u64) -> Self {
        Self {
            limit_tokens,
            reserved_tokens: 0,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.limit_tokens.saturating_sub(self.reserved_tokens)
    }

    pub fn can_cover(&self, tokens: u64) -> bool {
        self.remaining() >= tokens
    }

    /// Reserve `tokens` if the budget covers them
    pub fn try_reserve(&mut self, tokens: u64) -> bool {
        if !self.can_cover(tokens) {
            return false;
        }
        self.reserved_tokens += tokens;
        true
    }

    /// Replace a reservation with the amount actually spent
    pub fn settle(&mut self, reserved: u64, actual: u64) {
        self.reserved_tokens = self.reserved_tokens.saturating_sub(reserved) + actual;
    }

    pub fn reset(&mut self, limit_tokens: Option<u64>) {
        if let Some(limit) = limit_tokens {
            self.limit_tokens = limit;
        }
        self.reserved_tokens = 0;
    }
}

/// Snapshot of the global switches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub scheduler_enabled: bool,
    pub agents_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_until: Option<DateTime<Utc>>,
    pub budget: CycleBudget,
}

impl ControlState {
    pub fn new(budget_tokens: u64) -> Self {
        Self {
            scheduler_enabled: true,
            agents_enabled: true,
            paused_until: None,
            budget: CycleBudget::new(budget_tokens),
        }
    }

    /// Paused while `paused_until` lies in the future
    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.paused_until.is_some_and(|until| until > now)
    }
}
