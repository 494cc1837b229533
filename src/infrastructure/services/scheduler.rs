//! Interval scheduler - claims due schedule records and runs their workflows

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use crate::config::ScheduleSeed;
use crate::domain::{
    ControlRepository, DomainError, RunResult, ScheduleRepository, TriggerContext, WorkflowError,
    WorkflowKey, WorkflowScheduleRecord,
};
use crate::infrastructure::observability::record_schedule_claim;
use crate::infrastructure::workflow::WorkflowRegistry;

/// One claimed record and what its workflow returned
#[derive(Debug)]
pub struct ScheduledRun {
    pub schedule_id: String,
    pub workflow_key: String,
    pub outcome: Result<RunResult, WorkflowError>,
}

/// Summary of one scheduler tick
#[derive(Debug, Default)]
pub struct TickReport {
    /// The global scheduler flag was off; nothing was listed
    pub disabled: bool,
    pub runs: Vec<ScheduledRun>,
    /// Due records another instance claimed first
    pub lost_claims: usize,
}

pub struct IntervalScheduler {
    schedules: Arc<dyn ScheduleRepository>,
    control: Arc<dyn ControlRepository>,
    registry: Arc<WorkflowRegistry>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IntervalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalScheduler")
            .field("registry", &self.registry)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl IntervalScheduler {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        control: Arc<dyn ControlRepository>,
        registry: Arc<WorkflowRegistry>,
    ) -> Self {
        Self {
            schedules,
            control,
            registry,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create a record for every seed whose key has none yet.
    ///
    /// Existing records keep their persisted interval and enabled flag.
    pub async fn seed_schedules(
        &self,
        seeds: &[ScheduleSeed],
    ) -> Result<Vec<WorkflowScheduleRecord>, DomainError> {
        let mut created = Vec::new();

        for seed in seeds {
            if seed.interval_seconds == 0 {
                return Err(DomainError::configuration(format!(
                    "Schedule for '{}' needs a positive interval",
                    seed.workflow_key
                )));
            }

            if self
                .schedules
                .find_by_key(seed.workflow_key.as_str())
                .await?
                .is_some()
            {
                continue;
            }

            let record = WorkflowScheduleRecord::interval(
                Uuid::new_v4().to_string(),
                seed.workflow_key,
                seed.interval_seconds,
            );
            let record = self.schedules.upsert(record).await?;
            info!(
                workflow_key = %seed.workflow_key,
                interval_seconds = seed.interval_seconds,
                "Seeded schedule"
            );
            created.push(record);
        }

        Ok(created)
    }

    /// Claim and run every due record.
    ///
    /// Each claim reads the clock again, so a slow workflow earlier in the
    /// tick does not backdate the records after it. Only the winner of a
    /// claim runs the workflow; losers skip silently.
    /// A failing workflow never stops the others.
    #[instrument(skip(self))]
    pub async fn run_due_workflows(&self) -> Result<TickReport, WorkflowError> {
        let control = self.control.get().await?;
        if !control.scheduler_enabled {
            debug!("Scheduler disabled; skipping tick");
            return Ok(TickReport {
                disabled: true,
                ..TickReport::default()
            });
        }

        let now = self.clock.now();
        let due = self.schedules.list_due(now).await?;
        let mut report = TickReport::default();

        for record in due {
            let key = match record.key() {
                Ok(key) => key,
                Err(e) => {
                    error!(
                        schedule_id = %record.id,
                        workflow_key = %record.workflow_key,
                        error = %e,
                        "Unknown workflow key"
                    );
                    report.runs.push(ScheduledRun {
                        schedule_id: record.id,
                        workflow_key: record.workflow_key,
                        outcome: Err(e.into()),
                    });
                    continue;
                }
            };

            let claimed_at = self.clock.now();
            let won = self.schedules.try_claim(&record.id, claimed_at).await?;
            record_schedule_claim(key.as_str(), won);

            if !won {
                debug!(workflow_key = %key, "Claim lost to another instance");
                report.lost_claims += 1;
                continue;
            }

            let outcome = self
                .registry
                .handle_schedule(key, TriggerContext::new().with_timestamp(claimed_at))
                .await;

            if let Err(e) = &outcome {
                warn!(workflow_key = %key, error = %e, "Scheduled workflow failed");
            }

            report.runs.push(ScheduledRun {
                schedule_id: record.id,
                workflow_key: record.workflow_key,
                outcome,
            });
        }

        Ok(report)
    }

    /// Run a workflow immediately, ignoring its due time and the scheduler flag.
    ///
    /// The record, if any, advances as if it had been claimed now.
    #[instrument(skip(self, context), fields(workflow_key = %key))]
    pub async fn run_workflow_now(
        &self,
        key: WorkflowKey,
        context: TriggerContext,
    ) -> Result<RunResult, WorkflowError> {
        let now = self.clock.now();

        match self.schedules.find_by_key(key.as_str()).await? {
            Some(record) => self.schedules.mark_run(&record.id, now).await?,
            None => debug!("No schedule record; running without advancing"),
        }

        let context = if context.timestamp.is_none() {
            context.with_timestamp(now)
        } else {
            context
        };

        self.registry.handle_schedule(key, context).await
    }

    /// Tick every `poll_interval` until `shutdown` resolves
    pub async fn run_until<F>(&self, poll_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(poll_interval_secs = poll_interval.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.run_due_workflows().await {
                        Ok(report) if !report.runs.is_empty() => {
                            info!(
                                runs = report.runs.len(),
                                lost_claims = report.lost_claims,
                                "Scheduler tick finished"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Scheduler tick failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schedule::MockScheduleRepository;
    use crate::domain::workflow::mock::RecordingHandler;
    use crate::infrastructure::control::InMemoryControlRepository;
    use crate::infrastructure::schedule::InMemoryScheduleRepository;
    use crate::infrastructure::services::clock::FixedClock;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    /// Workflow that takes `takes` of clock time to finish
    #[derive(Debug)]
    struct SlowHandler {
        clock: Arc<FixedClock>,
        takes: ChronoDuration,
    }

    #[async_trait]
    impl crate::domain::WorkflowHandler for SlowHandler {
        fn name(&self) -> &str {
            "slow"
        }

        async fn handle(&self, _context: TriggerContext) -> Result<RunResult, WorkflowError> {
            self.clock.advance(self.takes);
            Ok(RunResult::default())
        }
    }

    struct Fixture {
        schedules: Arc<InMemoryScheduleRepository>,
        control: Arc<InMemoryControlRepository>,
        handler: Arc<RecordingHandler>,
        clock: Arc<FixedClock>,
        scheduler: IntervalScheduler,
    }

    fn fixture() -> Fixture {
        let schedules = Arc::new(InMemoryScheduleRepository::new());
        let control = Arc::new(InMemoryControlRepository::new(10_000));
        let handler = Arc::new(RecordingHandler::new("feed"));
        let mut registry = WorkflowRegistry::new();
        registry.register_handler(WorkflowKey::FeedEngagement, handler.clone());
        let clock = Arc::new(FixedClock::new(Utc::now()));

        let scheduler =
            IntervalScheduler::new(schedules.clone(), control.clone(), Arc::new(registry))
                .with_clock(clock.clone());

        Fixture {
            schedules,
            control,
            handler,
            clock,
            scheduler,
        }
    }

    fn seed(key: WorkflowKey, secs: u64) -> ScheduleSeed {
        ScheduleSeed {
            workflow_key: key,
            interval_seconds: secs,
        }
    }

    #[tokio::test]
    async fn test_claim_then_wait_for_interval() {
        let f = fixture();
        f.scheduler
            .seed_schedules(&[seed(WorkflowKey::FeedEngagement, 60)])
            .await
            .unwrap();

        let first = f.scheduler.run_due_workflows().await.unwrap();
        assert_eq!(first.runs.len(), 1);
        assert!(first.runs[0].outcome.is_ok());
        assert_eq!(f.handler.calls(), 1);

        f.clock.advance(ChronoDuration::seconds(30));
        let early = f.scheduler.run_due_workflows().await.unwrap();
        assert!(early.runs.is_empty());

        f.clock.advance(ChronoDuration::seconds(30));
        f.scheduler.run_due_workflows().await.unwrap();
        assert_eq!(f.handler.calls(), 2);
    }

    #[tokio::test]
    async fn test_slow_workflow_does_not_backdate_later_claims() {
        let start = Utc::now();
        let clock = Arc::new(FixedClock::new(start));
        let schedules = Arc::new(InMemoryScheduleRepository::new());
        schedules
            .upsert(WorkflowScheduleRecord::interval("a", WorkflowKey::FeedEngagement, 60))
            .await
            .unwrap();
        schedules
            .upsert(WorkflowScheduleRecord::interval(
                "b",
                WorkflowKey::CommunityDiscovery,
                60,
            ))
            .await
            .unwrap();

        let discovery = Arc::new(RecordingHandler::new("discovery"));
        let mut registry = WorkflowRegistry::new();
        registry.register_handler(
            WorkflowKey::FeedEngagement,
            Arc::new(SlowHandler {
                clock: clock.clone(),
                takes: ChronoDuration::minutes(5),
            }),
        );
        registry.register_handler(WorkflowKey::CommunityDiscovery, discovery.clone());

        let scheduler = IntervalScheduler::new(
            schedules.clone(),
            Arc::new(InMemoryControlRepository::new(1_000)),
            Arc::new(registry),
        )
        .with_clock(clock.clone());

        let report = scheduler.run_due_workflows().await.unwrap();
        assert_eq!(report.runs.len(), 2);

        let finished = start + ChronoDuration::minutes(5);
        let b = schedules
            .find_by_key(WorkflowKey::CommunityDiscovery.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.last_run_at, Some(finished));
        assert_eq!(b.next_run_at, Some(finished + ChronoDuration::seconds(60)));
        assert!(!b.is_due(clock.now()));
        assert_eq!(discovery.contexts()[0].timestamp, Some(finished));
    }

    #[tokio::test]
    async fn test_lost_claim_is_silent() {
        let now = Utc::now();
        let record = WorkflowScheduleRecord::interval("s1", WorkflowKey::FeedEngagement, 60);
        let mut schedules = MockScheduleRepository::new();
        schedules
            .expect_list_due()
            .returning(move |_| Ok(vec![record.clone()]));
        schedules.expect_try_claim().returning(|_, _| Ok(false));

        let handler = Arc::new(RecordingHandler::new("feed"));
        let mut registry = WorkflowRegistry::new();
        registry.register_handler(WorkflowKey::FeedEngagement, handler.clone());

        let scheduler = IntervalScheduler::new(
            Arc::new(schedules),
            Arc::new(InMemoryControlRepository::new(1_000)),
            Arc::new(registry),
        )
        .with_clock(Arc::new(FixedClock::new(now)));

        let report = scheduler.run_due_workflows().await.unwrap();

        assert!(report.runs.is_empty());
        assert_eq!(report.lost_claims, 1);
        assert_eq!(handler.calls(), 0);
    }

    #[tokio::test]
    async fn test_two_instances_share_one_period() {
        let f = fixture();
        f.scheduler
            .seed_schedules(&[seed(WorkflowKey::FeedEngagement, 60)])
            .await
            .unwrap();

        let other_handler = Arc::new(RecordingHandler::new("feed"));
        let mut registry = WorkflowRegistry::new();
        registry.register_handler(WorkflowKey::FeedEngagement, other_handler.clone());
        let other =
            IntervalScheduler::new(f.schedules.clone(), f.control.clone(), Arc::new(registry))
                .with_clock(f.clock.clone());

        let (a, b) = tokio::join!(f.scheduler.run_due_workflows(), other.run_due_workflows());
        let a = a.unwrap();
        let b = b.unwrap();

        assert_eq!(a.runs.len() + b.runs.len(), 1);
        assert_eq!(f.handler.calls() + other_handler.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_lists_nothing() {
        let f = fixture();
        f.scheduler
            .seed_schedules(&[seed(WorkflowKey::FeedEngagement, 60)])
            .await
            .unwrap();
        f.control.set_scheduler_enabled(false).await.unwrap();

        let report = f.scheduler.run_due_workflows().await.unwrap();

        assert!(report.disabled);
        assert_eq!(f.handler.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_stored_key_is_reported_not_claimed() {
        let f = fixture();
        let mut record = WorkflowScheduleRecord::interval("bad", WorkflowKey::FeedEngagement, 60);
        record.workflow_key = "weekly_digest".into();
        f.schedules.upsert(record).await.unwrap();

        let report = f.scheduler.run_due_workflows().await.unwrap();

        assert_eq!(report.runs.len(), 1);
        assert!(matches!(
            report.runs[0].outcome,
            Err(WorkflowError::Configuration(_))
        ));
        let stored = f.schedules.list().await.unwrap().remove(0);
        assert!(stored.last_run_at.is_none());
    }

    #[tokio::test]
    async fn test_failing_workflow_does_not_stop_others() {
        let f = fixture();
        f.scheduler
            .seed_schedules(&[
                seed(WorkflowKey::FeedEngagement, 60),
                seed(WorkflowKey::MemoryReflection, 60),
            ])
            .await
            .unwrap();

        let report = f.scheduler.run_due_workflows().await.unwrap();

        // memory_reflection has no handler in this registry
        assert_eq!(report.runs.len(), 2);
        assert_eq!(report.runs.iter().filter(|r| r.outcome.is_err()).count(), 1);
        assert_eq!(f.handler.calls(), 1);
    }

    #[tokio::test]
    async fn test_run_now_ignores_due_time_and_advances() {
        let f = fixture();
        let now = f.clock.now();
        f.schedules
            .upsert(
                WorkflowScheduleRecord::interval("s1", WorkflowKey::FeedEngagement, 600)
                    .with_next_run_at(now + ChronoDuration::hours(1)),
            )
            .await
            .unwrap();
        f.control.set_scheduler_enabled(false).await.unwrap();

        f.scheduler
            .run_workflow_now(WorkflowKey::FeedEngagement, TriggerContext::new())
            .await
            .unwrap();

        assert_eq!(f.handler.calls(), 1);
        assert_eq!(f.handler.contexts()[0].timestamp, Some(now));
        let stored = f.schedules.find_by_key("feed_engagement").await.unwrap().unwrap();
        assert_eq!(stored.last_run_at, Some(now));
        assert_eq!(stored.next_run_at, Some(now + ChronoDuration::seconds(600)));
    }

    #[tokio::test]
    async fn test_seeding_keeps_existing_records() {
        let f = fixture();
        f.schedules
            .upsert(
                WorkflowScheduleRecord::interval("s1", WorkflowKey::FeedEngagement, 42).disabled(),
            )
            .await
            .unwrap();

        let created = f
            .scheduler
            .seed_schedules(&[
                seed(WorkflowKey::FeedEngagement, 60),
                seed(WorkflowKey::CommunityDiscovery, 3_600),
            ])
            .await
            .unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].workflow_key, "community_discovery");
        let kept = f.schedules.find_by_key("feed_engagement").await.unwrap().unwrap();
        assert_eq!(kept.interval_seconds, 42);
        assert!(!kept.enabled);
    }

    #[tokio::test]
    async fn test_zero_interval_seed_is_rejected() {
        let f = fixture();
        let err = f
            .scheduler
            .seed_schedules(&[seed(WorkflowKey::FeedEngagement, 0)])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let f = fixture();
        f.scheduler
            .seed_schedules(&[seed(WorkflowKey::FeedEngagement, 60)])
            .await
            .unwrap();

        f.scheduler
            .run_until(
                Duration::from_millis(10),
                tokio::time::sleep(Duration::from_millis(35)),
            )
            .await;

        // first tick fires immediately; later ticks find nothing due
        assert_eq!(f.handler.calls(), 1);
    }
}
