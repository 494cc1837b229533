//! In-memory schedule repository

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{DomainError, ScheduleRepository, WorkflowScheduleRecord};

/// Process-local schedule store.
///
/// A claim checks and advances the record under one write lock, so
/// concurrent callers in this process see exactly one winner per period.
#[derive(Debug, Default)]
pub struct InMemoryScheduleRepository {
    records: RwLock<BTreeMap<String, WorkflowScheduleRecord>>,
}

impl InMemoryScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<T>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut WorkflowScheduleRecord) -> T,
    ) -> Result<T, DomainError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| DomainError::storage("Schedule store lock poisoned"))?;

        let record = records
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("Schedule '{}' not found", id)))?;

        Ok(apply(record))
    }

    fn snapshot(&self) -> Result<Vec<WorkflowScheduleRecord>, DomainError> {
        let records = self
            .records
            .read()
            .map_err(|_| DomainError::storage("Schedule store lock poisoned"))?;

        Ok(records.values().cloned().collect())
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryScheduleRepository {
    async fn list(&self) -> Result<Vec<WorkflowScheduleRecord>, DomainError> {
        self.snapshot()
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowScheduleRecord>, DomainError> {
        Ok(self
            .snapshot()?
            .into_iter()
            .filter(|record| record.is_due(now))
            .collect())
    }

    async fn find_by_key(
        &self,
        workflow_key: &str,
    ) -> Result<Option<WorkflowScheduleRecord>, DomainError> {
        Ok(self
            .snapshot()?
            .into_iter()
            .find(|record| record.workflow_key == workflow_key))
    }

    async fn upsert(
        &self,
        record: WorkflowScheduleRecord,
    ) -> Result<WorkflowScheduleRecord, DomainError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| DomainError::storage("Schedule store lock poisoned"))?;

        let key_taken = records
            .values()
            .any(|other| other.workflow_key == record.workflow_key && other.id != record.id);
        if key_taken {
            return Err(DomainError::conflict(format!(
                "Workflow '{}' already has a schedule",
                record.workflow_key
            )));
        }

        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn try_claim(&self, id: &str, now: DateTime<Utc>) -> Result<bool, DomainError> {
        self.update(id, |record| {
            if !record.is_due(now) {
                return false;
            }
            record.advance(now);
            true
        })
    }

    async fn mark_run(&self, id: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.update(id, |record| record.advance(now))
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), DomainError> {
        self.update(id, |record| record.enabled = enabled)
    }

    async fn set_interval(&self, id: &str, interval_seconds: u64) -> Result<(), DomainError> {
        if interval_seconds == 0 {
            return Err(DomainError::validation("Interval must be at least one second"));
        }
        self.update(id, |record| record.interval_seconds = interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkflowKey;
    use chrono::Duration;
    use std::sync::Arc;

    fn record(id: &str, key: WorkflowKey) -> WorkflowScheduleRecord {
        WorkflowScheduleRecord::interval(id, key, 60)
    }

    #[tokio::test]
    async fn test_exactly_one_concurrent_claim_wins() {
        let repo = Arc::new(InMemoryScheduleRepository::new());
        repo.upsert(record("s1", WorkflowKey::FeedEngagement))
            .await
            .unwrap();
        let now = Utc::now();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.try_claim("s1", now).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        let stored = repo.find_by_key("feed_engagement").await.unwrap().unwrap();
        assert_eq!(stored.last_run_at, Some(now));
        assert_eq!(stored.next_run_at, Some(now + Duration::seconds(60)));
    }

    #[tokio::test]
    async fn test_claim_again_after_interval() {
        let repo = InMemoryScheduleRepository::new();
        repo.upsert(record("s1", WorkflowKey::FeedEngagement))
            .await
            .unwrap();
        let now = Utc::now();

        assert!(repo.try_claim("s1", now).await.unwrap());
        assert!(!repo.try_claim("s1", now + Duration::seconds(30)).await.unwrap());
        assert!(repo.try_claim("s1", now + Duration::seconds(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_disabled_record_is_not_due_or_claimable() {
        let repo = InMemoryScheduleRepository::new();
        repo.upsert(record("s1", WorkflowKey::CommunityDiscovery))
            .await
            .unwrap();
        repo.set_enabled("s1", false).await.unwrap();
        let now = Utc::now();

        assert!(repo.list_due(now).await.unwrap().is_empty());
        assert!(!repo.try_claim("s1", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_run_ignores_due_time() {
        let repo = InMemoryScheduleRepository::new();
        let now = Utc::now();
        repo.upsert(
            record("s1", WorkflowKey::MemoryReflection).with_next_run_at(now + Duration::hours(1)),
        )
        .await
        .unwrap();

        repo.mark_run("s1", now).await.unwrap();

        let stored = repo.list().await.unwrap().remove(0);
        assert_eq!(stored.last_run_at, Some(now));
        assert_eq!(stored.next_run_at, Some(now + Duration::seconds(60)));
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let repo = InMemoryScheduleRepository::new();

        let err = repo.try_claim("missing", Utc::now()).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.set_interval("missing", 10).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_key_is_conflict() {
        let repo = InMemoryScheduleRepository::new();
        repo.upsert(record("s1", WorkflowKey::FeedEngagement))
            .await
            .unwrap();

        let err = repo
            .upsert(record("s2", WorkflowKey::FeedEngagement))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict { .. }));

        let mut updated = record("s1", WorkflowKey::FeedEngagement);
        updated.interval_seconds = 120;
        assert_eq!(repo.upsert(updated).await.unwrap().interval_seconds, 120);
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let repo = InMemoryScheduleRepository::new();
        repo.upsert(record("s1", WorkflowKey::FeedEngagement))
            .await
            .unwrap();

        let err = repo.set_interval("s1", 0).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }
}
