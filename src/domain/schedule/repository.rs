//! Schedule repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[cfg(test)]
use mockall::automock;

use super::WorkflowScheduleRecord;
use crate::domain::error::DomainError;

/// Repository for schedule records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// All records, ordered by id
    async fn list(&self) -> Result<Vec<WorkflowScheduleRecord>, DomainError>;

    /// Interval-mode, enabled records with `next_run_at <= now`
    async fn list_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowScheduleRecord>, DomainError>;

    async fn find_by_key(&self, workflow_key: &str)
    -> Result<Option<WorkflowScheduleRecord>, DomainError>;

    /// Insert a record, or replace the one with the same id
    async fn upsert(
        &self,
        record: WorkflowScheduleRecord,
    ) -> Result<WorkflowScheduleRecord, DomainError>;

    /// Compare-and-swap claim of one due period.
    ///
    /// Atomically advances `last_run_at`/`next_run_at` if and only if the
    /// record is still enabled and due at `now`. Exactly one of any number of
    /// concurrent callers gets `true`.
    async fn try_claim(&self, id: &str, now: DateTime<Utc>) -> Result<bool, DomainError>;

    /// Unconditionally advance `last_run_at`/`next_run_at` (forced runs)
    async fn mark_run(&self, id: &str, now: DateTime<Utc>) -> Result<(), DomainError>;

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), DomainError>;

    async fn set_interval(&self, id: &str, interval_seconds: u64) -> Result<(), DomainError>;
}
