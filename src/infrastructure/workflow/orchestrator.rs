//! Perceive / reason / act loop

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::side_effects::SideEffectDispatcher;
use super::tool_registry::ToolRegistry;
use crate::domain::workflow::{
    ActionEvent, DecisionError, DecisionMaker, Observation, RunErrorKind, RunPhase,
};
use crate::domain::{ActionId, AgentOrchestrator, AgentRunState, WorkflowScope};
use crate::infrastructure::observability::{record_action, record_agent_run};

/// Loop limits for the orchestrator
#[derive(Debug, Clone)]
pub struct RunLoopConfig {
    /// Hard cap on loop iterations; values below 1 are treated as 1
    pub max_iterations: u32,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self { max_iterations: 3 }
    }
}

/// Orchestrator running one scope through Observing, Reasoning and Acting
/// until the decision stops, the iteration cap is hit or a fatal error occurs.
#[derive(Debug)]
pub struct PerceiveReasonActOrchestrator {
    tools: Arc<ToolRegistry>,
    decision_maker: Arc<dyn DecisionMaker>,
    effects: SideEffectDispatcher,
    config: RunLoopConfig,
}

impl PerceiveReasonActOrchestrator {
    pub fn new(tools: Arc<ToolRegistry>, decision_maker: Arc<dyn DecisionMaker>) -> Self {
        Self {
            tools,
            decision_maker,
            effects: SideEffectDispatcher::new(),
            config: RunLoopConfig::default(),
        }
    }

    pub fn with_effects(mut self, effects: SideEffectDispatcher) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_config(mut self, config: RunLoopConfig) -> Self {
        self.config = config;
        self
    }

    fn max_iterations(&self) -> u32 {
        self.config.max_iterations.max(1)
    }

    /// Load every in-scope domain. Returns `None` once a fatal error halted the run.
    async fn observe(
        &self,
        scope: &WorkflowScope,
        state: &mut AgentRunState,
    ) -> Option<Observation> {
        state.phase = RunPhase::Observing;
        let mut observation = Observation::new();

        for domain in scope.data_scope().domains() {
            match self.tools.load(scope, domain).await {
                Ok(value) => observation.insert(domain, value),
                Err(e) => {
                    let kind = e.run_error_kind(true);
                    warn!(
                        agent_id = %state.agent_id,
                        iteration = state.iteration,
                        domain = %domain,
                        error = %e,
                        "Failed to load domain"
                    );
                    state.record_error(kind, e.to_string());

                    if kind.is_fatal() {
                        return None;
                    }
                }
            }
        }

        Some(observation)
    }

    async fn act(
        &self,
        scope: &WorkflowScope,
        state: &mut AgentRunState,
        action: ActionId,
        params: Value,
    ) {
        state.phase = RunPhase::Acting;

        match self.tools.execute(scope, &action, &params).await {
            Ok(output) => {
                record_action(action.as_str(), true);
                debug!(
                    agent_id = %state.agent_id,
                    iteration = state.iteration,
                    action = %action,
                    "Action executed"
                );

                // handles are dropped: effects are never awaited by the run
                let _ = self.effects.dispatch(ActionEvent {
                    agent_id: state.agent_id.clone(),
                    action: action.clone(),
                    trigger: scope.trigger().clone(),
                    subject_id: scope.subject().id.clone(),
                    params: params.clone(),
                    output: output.clone(),
                    occurred_at: Utc::now(),
                });

                state.record_action(action, params, output);
            }
            Err(e) => {
                record_action(action.as_str(), false);
                warn!(
                    agent_id = %state.agent_id,
                    iteration = state.iteration,
                    action = %action,
                    error = %e,
                    "Action failed"
                );
                state.record_error(e.run_error_kind(false), e.to_string());
            }
        }
    }
}

#[async_trait]
impl AgentOrchestrator for PerceiveReasonActOrchestrator {
    async fn run(&self, scope: &WorkflowScope) -> AgentRunState {
        let started = Instant::now();
        let mut state = AgentRunState::new(scope.actor().id.clone(), Utc::now());
        let max_iterations = self.max_iterations();

        debug!(
            agent_id = %state.agent_id,
            trigger = %scope.trigger().label(),
            max_iterations,
            "Starting run"
        );

        loop {
            state.iteration += 1;

            let Some(observation) = self.observe(scope, &mut state).await else {
                break;
            };

            state.phase = RunPhase::Reasoning;
            let outcome = match self.decision_maker.decide(scope, &observation, &state).await {
                Ok(outcome) => outcome,
                Err(DecisionError::Completion(e)) => {
                    warn!(
                        agent_id = %state.agent_id,
                        iteration = state.iteration,
                        error = %e,
                        "No model produced a decision"
                    );
                    state.record_error(RunErrorKind::ProviderExhausted, e.to_string());
                    break;
                }
                Err(e @ DecisionError::Malformed(_)) => {
                    warn!(
                        agent_id = %state.agent_id,
                        iteration = state.iteration,
                        error = %e,
                        "Unusable decision"
                    );
                    state.record_error(RunErrorKind::InvalidDecision, e.to_string());
                    break;
                }
            };

            if let Some(usage) = &outcome.usage {
                state.usage.add(usage);
            }

            let decision = outcome.decision;
            debug!(
                agent_id = %state.agent_id,
                iteration = state.iteration,
                model = %outcome.model,
                action = %decision.action,
                continue_run = decision.continue_run,
                "Decision made"
            );

            if !decision.action.is_noop() {
                if !self.tools.enforcer().can_perform(scope, &decision.action) {
                    warn!(
                        agent_id = %state.agent_id,
                        iteration = state.iteration,
                        action = %decision.action,
                        "Decision names an action outside the scope"
                    );
                    state.record_error(
                        RunErrorKind::InvalidDecision,
                        format!("Action '{}' is not available in this scope", decision.action),
                    );
                    break;
                }

                self.act(scope, &mut state, decision.action, decision.params).await;

                if state.is_halted() {
                    break;
                }
            }

            if !decision.continue_run || state.iteration >= max_iterations {
                break;
            }
        }

        state.phase = RunPhase::Stopped;

        let label = scope.trigger().label();
        record_agent_run(&label, state.success(), state.iteration, started.elapsed());
        info!(
            agent_id = %state.agent_id,
            trigger = %label,
            iterations = state.iteration,
            actions = state.executed_actions.len(),
            errors = state.errors.len(),
            halted = state.is_halted(),
            "Run finished"
        );

        state
    }
}
