//! Schedule records for interval workflows

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::scope::WorkflowKey;

/// How a record's workflow is started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// Started by the interval scheduler
    Interval,
    /// Started by events only; the scheduler ignores it
    Event,
}

impl ScheduleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::Event => "event",
        }
    }
}

impl FromStr for ScheduleMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interval" => Ok(Self::Interval),
            "event" => Ok(Self::Event),
            other => Err(DomainError::configuration(format!(
                "Unknown schedule mode '{}'",
                other
            ))),
        }
    }
}

/// Persistent schedule of one workflow key.
///
/// Only the claim and admin updates mutate a record; records are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowScheduleRecord {
    pub id: String,
    /// Stored as text; see [`WorkflowScheduleRecord::key`]
    pub workflow_key: String,
    pub mode: ScheduleMode,
    pub enabled: bool,
    pub interval_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    /// `None` means due immediately
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl WorkflowScheduleRecord {
    pub fn interval(id: impl Into<String>, key: WorkflowKey, interval_seconds: u64) -> Self {
        Self {
            id: id.into(),
            workflow_key: key.as_str().to_string(),
            mode: ScheduleMode::Interval,
            enabled: true,
            interval_seconds,
            last_run_at: None,
            next_run_at: None,
        }
    }

    pub fn with_next_run_at(mut self, next_run_at: DateTime<Utc>) -> Self {
        self.next_run_at = Some(next_run_at);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Parse the stored key; unknown keys are configuration errors
    pub fn key(&self) -> Result<WorkflowKey, DomainError> {
        self.workflow_key.parse()
    }

    /// Interval-mode, enabled and `next_run_at <= now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.mode == ScheduleMode::Interval
            && self.enabled
            && self.next_run_at.is_none_or(|next| next <= now)
    }

    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.interval_seconds.min(i64::MAX as u64) as i64)
    }

    /// Record a run at `now`
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.last_run_at = Some(now);
        self.next_run_at = Some(self.next_run_after(now));
    }
}
