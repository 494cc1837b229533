//! Admin control surface for schedules, agents and the cycle budget

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};

use super::clock::{Clock, SystemClock};
use super::scheduler::IntervalScheduler;
use crate::domain::{
    ControlRepository, ControlState, DomainError, RunResult, ScheduleRepository, TriggerContext,
    WorkflowError, WorkflowKey, WorkflowScheduleRecord,
};

pub struct AdminService {
    schedules: Arc<dyn ScheduleRepository>,
    control: Arc<dyn ControlRepository>,
    scheduler: Arc<IntervalScheduler>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AdminService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminService")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl AdminService {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        control: Arc<dyn ControlRepository>,
        scheduler: Arc<IntervalScheduler>,
    ) -> Self {
        Self {
            schedules,
            control,
            scheduler,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn status(&self) -> Result<ControlState, DomainError> {
        self.control.get().await
    }

    pub async fn list_schedules(&self) -> Result<Vec<WorkflowScheduleRecord>, DomainError> {
        self.schedules.list().await
    }

    #[instrument(skip(self))]
    pub async fn set_scheduler_enabled(&self, enabled: bool) -> Result<(), DomainError> {
        self.control.set_scheduler_enabled(enabled).await?;
        info!(enabled, "Scheduler flag changed");
        Ok(())
    }

    async fn record_for(&self, key: WorkflowKey) -> Result<WorkflowScheduleRecord, DomainError> {
        self.schedules
            .find_by_key(key.as_str())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("No schedule for workflow '{}'", key)))
    }

    #[instrument(skip(self))]
    pub async fn set_schedule_enabled(
        &self,
        key: WorkflowKey,
        enabled: bool,
    ) -> Result<(), DomainError> {
        let record = self.record_for(key).await?;
        self.schedules.set_enabled(&record.id, enabled).await?;
        info!(workflow_key = %key, enabled, "Schedule flag changed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_schedule_interval(
        &self,
        key: WorkflowKey,
        interval_seconds: u64,
    ) -> Result<(), DomainError> {
        if interval_seconds == 0 {
            return Err(DomainError::validation("Interval must be at least one second"));
        }

        let record = self.record_for(key).await?;
        self.schedules.set_interval(&record.id, interval_seconds).await?;
        info!(workflow_key = %key, interval_seconds, "Schedule interval changed");
        Ok(())
    }

    /// Run a workflow now regardless of its schedule
    pub async fn force_run(
        &self,
        key: WorkflowKey,
        context: TriggerContext,
    ) -> Result<RunResult, WorkflowError> {
        info!(workflow_key = %key, "Forcing workflow run");
        self.scheduler.run_workflow_now(key, context).await
    }

    #[instrument(skip(self))]
    pub async fn set_agents_enabled(&self, enabled: bool) -> Result<(), DomainError> {
        self.control.set_agents_enabled(enabled).await?;
        info!(enabled, "Agents flag changed");
        Ok(())
    }

    /// Pause batches until `until`; it must lie in the future
    #[instrument(skip(self))]
    pub async fn pause_until(&self, until: DateTime<Utc>) -> Result<(), DomainError> {
        if until <= self.clock.now() {
            return Err(DomainError::validation("Pause must end in the future"));
        }

        self.control.set_paused_until(Some(until)).await?;
        info!(%until, "Agents paused");
        Ok(())
    }

    pub async fn pause_for(&self, duration: Duration) -> Result<DateTime<Utc>, DomainError> {
        let until = self.clock.now() + duration;
        self.pause_until(until).await?;
        Ok(until)
    }

    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<(), DomainError> {
        self.control.set_paused_until(None).await?;
        info!("Agents resumed");
        Ok(())
    }

    /// Start a new budget cycle, optionally with a new limit
    #[instrument(skip(self))]
    pub async fn reset_budget(&self, limit_tokens: Option<u64>) -> Result<(), DomainError> {
        self.control.reset_budget(limit_tokens).await?;
        info!(?limit_tokens, "Cycle budget reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::control::MockControlRepository;
    use crate::domain::workflow::mock::RecordingHandler;
    use crate::infrastructure::control::InMemoryControlRepository;
    use crate::infrastructure::schedule::InMemoryScheduleRepository;
    use crate::infrastructure::services::clock::FixedClock;
    use crate::infrastructure::workflow::WorkflowRegistry;

    struct Fixture {
        schedules: Arc<InMemoryScheduleRepository>,
        control: Arc<InMemoryControlRepository>,
        handler: Arc<RecordingHandler>,
        clock: Arc<FixedClock>,
        admin: AdminService,
    }

    async fn fixture() -> Fixture {
        let schedules = Arc::new(InMemoryScheduleRepository::new());
        schedules
            .upsert(WorkflowScheduleRecord::interval("s1", WorkflowKey::FeedEngagement, 60))
            .await
            .unwrap();
        let control = Arc::new(InMemoryControlRepository::new(5_000));
        let handler = Arc::new(RecordingHandler::new("feed"));
        let mut registry = WorkflowRegistry::new();
        registry.register_handler(WorkflowKey::FeedEngagement, handler.clone());
        let clock = Arc::new(FixedClock::new(Utc::now()));

        let scheduler = Arc::new(
            IntervalScheduler::new(schedules.clone(), control.clone(), Arc::new(registry))
                .with_clock(clock.clone()),
        );
        let admin = AdminService::new(schedules.clone(), control.clone(), scheduler)
            .with_clock(clock.clone());

        Fixture {
            schedules,
            control,
            handler,
            clock,
            admin,
        }
    }

    #[tokio::test]
    async fn test_schedule_toggles_by_key() {
        let f = fixture().await;

        f.admin
            .set_schedule_enabled(WorkflowKey::FeedEngagement, false)
            .await
            .unwrap();
        f.admin
            .set_schedule_interval(WorkflowKey::FeedEngagement, 900)
            .await
            .unwrap();

        let record = f.schedules.find_by_key("feed_engagement").await.unwrap().unwrap();
        assert!(!record.enabled);
        assert_eq!(record.interval_seconds, 900);
    }

    #[tokio::test]
    async fn test_missing_schedule_is_not_found() {
        let f = fixture().await;

        let err = f
            .admin
            .set_schedule_enabled(WorkflowKey::MemoryReflection, true)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_force_run_invokes_handler() {
        let f = fixture().await;

        f.admin
            .force_run(WorkflowKey::FeedEngagement, TriggerContext::new())
            .await
            .unwrap();

        assert_eq!(f.handler.calls(), 1);
        let record = f.schedules.find_by_key("feed_engagement").await.unwrap().unwrap();
        assert_eq!(record.last_run_at, Some(f.clock.now()));
    }

    #[tokio::test]
    async fn test_pause_must_be_in_future() {
        let f = fixture().await;
        let now = f.clock.now();

        let err = f.admin.pause_until(now).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));

        let until = f.admin.pause_for(Duration::minutes(15)).await.unwrap();
        let state = f.admin.status().await.unwrap();
        assert_eq!(state.paused_until, Some(until));
        assert!(state.is_paused(now));

        f.admin.resume().await.unwrap();
        assert!(f.control.get().await.unwrap().paused_until.is_none());
    }

    #[tokio::test]
    async fn test_flags_and_budget_reset() {
        let f = fixture().await;
        assert!(f.control.try_reserve_budget(4_000).await.unwrap());

        f.admin.set_scheduler_enabled(false).await.unwrap();
        f.admin.set_agents_enabled(false).await.unwrap();
        f.admin.reset_budget(Some(8_000)).await.unwrap();

        let state = f.admin.status().await.unwrap();
        assert!(!state.scheduler_enabled);
        assert!(!state.agents_enabled);
        assert_eq!(state.budget.limit_tokens, 8_000);
        assert_eq!(state.budget.remaining(), 8_000);
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let mut control = MockControlRepository::new();
        control
            .expect_set_agents_enabled()
            .returning(|_| Err(DomainError::storage("connection refused")));

        let registry = Arc::new(WorkflowRegistry::new());
        let schedules = Arc::new(InMemoryScheduleRepository::new());
        let control = Arc::new(control);
        let scheduler = Arc::new(IntervalScheduler::new(
            schedules.clone(),
            control.clone(),
            registry,
        ));
        let admin = AdminService::new(schedules, control, scheduler);

        let err = admin.set_agents_enabled(true).await.unwrap_err();
        assert!(matches!(err, DomainError::Storage { .. }));
    }
}
