//! Per-run mutable state of the perceive/reason/act loop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::llm::Usage;
use crate::domain::scope::{ActionId, AgentId};

/// Loop phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Observing,
    Reasoning,
    Acting,
    Stopped,
}

/// Category of a failure recorded during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    /// A data tool failed to load an in-scope domain
    DataLoad,
    /// An in-scope action tool reported failure
    Action,
    /// The model's answer could not be used
    InvalidDecision,
    /// Every candidate model failed
    ProviderExhausted,
    /// Out-of-scope access was attempted
    ScopeViolation,
    /// A domain or action has no registered tool
    MissingTool,
    /// The run task itself died (panic or cancellation)
    Internal,
}

impl RunErrorKind {
    /// Fatal kinds stop the run immediately
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProviderExhausted | Self::ScopeViolation | Self::MissingTool | Self::Internal
        )
    }
}

/// A failure recorded during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub kind: RunErrorKind,
    pub message: String,
    pub iteration: u32,
}

/// An action that was attempted and succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    pub action: ActionId,
    pub iteration: u32,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub output: Value,
}

/// Mutable record owned by exactly one orchestrator invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunState {
    pub agent_id: AgentId,
    pub iteration: u32,
    pub phase: RunPhase,
    pub executed_actions: Vec<ExecutedAction>,
    pub errors: Vec<RunError>,
    /// The fatal error that stopped the run, if any (also present in `errors`)
    pub halted_by: Option<RunError>,
    pub usage: Usage,
    pub start_time: DateTime<Utc>,
}

impl AgentRunState {
    pub fn new(agent_id: AgentId, start_time: DateTime<Utc>) -> Self {
        Self {
            agent_id,
            iteration: 0,
            phase: RunPhase::Observing,
            executed_actions: Vec::new(),
            errors: Vec::new(),
            halted_by: None,
            usage: Usage::default(),
            start_time,
        }
    }

    /// State for a run whose task died before returning its own state
    pub fn aborted(
        agent_id: AgentId,
        start_time: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        let mut state = Self::new(agent_id, start_time);
        state.phase = RunPhase::Stopped;
        state.record_error(RunErrorKind::Internal, message);
        state
    }

    /// Success is exactly "no errors were recorded"
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn record_error(&mut self, kind: RunErrorKind, message: impl Into<String>) {
        let error = RunError {
            kind,
            message: message.into(),
            iteration: self.iteration,
        };

        if kind.is_fatal() && self.halted_by.is_none() {
            self.halted_by = Some(error.clone());
        }

        self.errors.push(error);
    }

    pub fn record_action(&mut self, action: ActionId, params: Value, output: Value) {
        self.executed_actions.push(ExecutedAction {
            action,
            iteration: self.iteration,
            params,
            output,
        });
    }

    pub fn is_halted(&self) -> bool {
        self.halted_by.is_some()
    }

    pub fn executed_action_ids(&self) -> Vec<&ActionId> {
        self.executed_actions.iter().map(|a| &a.action).collect()
    }
}
