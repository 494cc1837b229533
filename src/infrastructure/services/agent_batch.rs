//! Agent batch processor - fan one trigger out to a random subset of agents

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use crate::config::BatchConfig;
use crate::domain::workflow::{BatchSkipReason, SkipReason, SkippedAgent};
use crate::domain::{
    AgentDirectory, AgentId, AgentOrchestrator, AgentRunReport, AgentRunState, ControlRepository,
    RunResult, WorkflowError, WorkflowScope,
};
use crate::infrastructure::observability::record_batch_skip;

/// Outcome of the batch gates
#[derive(Debug, Clone, PartialEq)]
pub enum BatchPlan {
    Skipped(BatchSkipReason),
    Agents(Vec<AgentId>),
}

pub struct AgentBatchProcessor {
    directory: Arc<dyn AgentDirectory>,
    control: Arc<dyn ControlRepository>,
    orchestrator: Arc<dyn AgentOrchestrator>,
    config: BatchConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AgentBatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBatchProcessor")
            .field("orchestrator", &self.orchestrator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AgentBatchProcessor {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        control: Arc<dyn ControlRepository>,
        orchestrator: Arc<dyn AgentOrchestrator>,
        config: BatchConfig,
    ) -> Self {
        Self {
            directory,
            control,
            orchestrator,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The orchestrator shared with single-agent handlers
    pub fn orchestrator(&self) -> Arc<dyn AgentOrchestrator> {
        self.orchestrator.clone()
    }

    /// Apply the global gates and pick the agents for this batch
    pub async fn plan(&self, exclude: &[AgentId]) -> Result<BatchPlan, WorkflowError> {
        let control = self.control.get().await?;

        if !control.agents_enabled {
            return Ok(BatchPlan::Skipped(BatchSkipReason::AgentsDisabled));
        }

        if control.is_paused(self.clock.now()) {
            if let Some(until) = control.paused_until {
                return Ok(BatchPlan::Skipped(BatchSkipReason::Paused { until }));
            }
        }

        let mut eligible = self.directory.eligible_agents().await?;
        eligible.retain(|agent| !exclude.contains(agent));
        if eligible.is_empty() {
            return Ok(BatchPlan::Skipped(BatchSkipReason::NoEligibleAgents));
        }

        Ok(BatchPlan::Agents(self.select(&eligible)))
    }

    /// Uniform sample without replacement. The sample size lies in
    /// `[min_agents, max_agents]` and stays below the population whenever the
    /// population exceeds `min_agents`.
    pub fn select(&self, eligible: &[AgentId]) -> Vec<AgentId> {
        let population = eligible.len();
        if population == 0 {
            return Vec::new();
        }

        let min = self.config.min_agents.max(1).min(population);
        let mut max = self.config.max_agents.max(min).min(population);
        if population > min {
            max = max.min(population - 1);
        }

        let mut rng = rand::thread_rng();
        let size = rng.gen_range(min..=max);

        eligible.choose_multiple(&mut rng, size).cloned().collect()
    }

    pub async fn run_batch<F, Fut>(&self, label: &str, build: F) -> Result<RunResult, WorkflowError>
    where
        F: Fn(AgentId) -> Fut,
        Fut: Future<Output = Result<WorkflowScope, WorkflowError>>,
    {
        self.run_batch_excluding(label, &[], build).await
    }

    /// Gate, build one scope per selected agent, then run them. Agents in
    /// `exclude` (e.g. the author of the triggering post) are never selected.
    ///
    /// A scope that cannot be built aborts the batch before any run starts.
    pub async fn run_batch_excluding<F, Fut>(
        &self,
        label: &str,
        exclude: &[AgentId],
        build: F,
    ) -> Result<RunResult, WorkflowError>
    where
        F: Fn(AgentId) -> Fut,
        Fut: Future<Output = Result<WorkflowScope, WorkflowError>>,
    {
        let agents = match self.plan(exclude).await? {
            BatchPlan::Skipped(reason) => {
                let name = match &reason {
                    BatchSkipReason::Paused { .. } => "paused",
                    BatchSkipReason::AgentsDisabled => "agents_disabled",
                    BatchSkipReason::NoEligibleAgents => "no_eligible_agents",
                };
                record_batch_skip(name);
                info!(batch = label, reason = name, "Batch skipped");
                return Ok(RunResult::batch_skipped(reason));
            }
            BatchPlan::Agents(agents) => agents,
        };

        let mut scopes = Vec::with_capacity(agents.len());
        for agent in agents {
            scopes.push(build(agent).await?);
        }

        let result = self.execute(scopes).await;
        info!(
            batch = label,
            runs = result.runs.len(),
            skipped = result.skipped.len(),
            actions = result.executed_action_count(),
            "Batch finished"
        );

        Ok(result)
    }

    /// Run the scopes with at most `max_concurrent` in flight.
    ///
    /// Each run reserves its estimate once it holds a permit, and settles its
    /// real usage before releasing the permit, so later admissions see what
    /// earlier runs spent. Agents the budget no longer covers are skipped.
    pub async fn execute(&self, scopes: Vec<WorkflowScope>) -> RunResult {
        let estimate = self.config.estimated_tokens_per_run;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(scopes.len());

        for scope in scopes {
            let semaphore = semaphore.clone();
            let orchestrator = self.orchestrator.clone();
            let control = self.control.clone();
            let agent_id = scope.actor().id.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let agent_id = scope.actor().id.clone();

                match control.try_reserve_budget(estimate).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(agent_id = %agent_id, "Cycle budget exhausted");
                        return Admission::OverBudget;
                    }
                    Err(e) => {
                        warn!(agent_id = %agent_id, error = %e, "Budget reservation failed");
                        return Admission::OverBudget;
                    }
                }

                let state = orchestrator.run(&scope).await;
                let used = u64::from(state.usage.total_tokens);
                if let Err(e) = control.settle_budget(estimate, used).await {
                    warn!(agent_id = %agent_id, error = %e, "Budget settlement failed");
                }

                Admission::Ran(state)
            });

            handles.push((agent_id, Utc::now(), handle));
        }

        let mut result = RunResult::default();

        for (agent_id, started_at, handle) in handles {
            match handle.await {
                Ok(Admission::Ran(state)) => {
                    result.runs.push(AgentRunReport::from_state(state, Utc::now()));
                }
                Ok(Admission::OverBudget) => result.skipped.push(SkippedAgent {
                    agent_id,
                    reason: SkipReason::Budget,
                }),
                Err(e) => {
                    warn!(agent_id = %agent_id, error = %e, "Agent run task failed");

                    // usage is unknown, so the whole estimate stays spent
                    if let Err(e) = self.control.settle_budget(estimate, estimate).await {
                        warn!(agent_id = %agent_id, error = %e, "Budget settlement failed");
                    }

                    let state = AgentRunState::aborted(
                        agent_id,
                        started_at,
                        format!("Agent run task failed: {}", e),
                    );
                    result.runs.push(AgentRunReport::from_state(state, Utc::now()));
                }
            }
        }

        result
    }
}

/// What a spawned run task did with its permit
enum Admission {
    Ran(AgentRunState),
    OverBudget,
}
