//! Results returned to handler callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentRunState, ExecutedAction, RunError};
use crate::domain::llm::Usage;
use crate::domain::scope::AgentId;

/// Outcome of one agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunReport {
    pub agent_id: AgentId,
    pub success: bool,
    pub iterations: u32,
    pub executed_actions: Vec<ExecutedAction>,
    pub errors: Vec<RunError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_by: Option<RunError>,
    pub usage: Usage,
    pub execution_time_ms: u64,
}

impl AgentRunReport {
    pub fn from_state(state: AgentRunState, finished_at: DateTime<Utc>) -> Self {
        let execution_time_ms = (finished_at - state.start_time).num_milliseconds().max(0) as u64;

        Self {
            success: state.success(),
            agent_id: state.agent_id,
            iterations: state.iteration,
            executed_actions: state.executed_actions,
            errors: state.errors,
            halted_by: state.halted_by,
            usage: state.usage,
            execution_time_ms,
        }
    }
}

/// Why a selected agent did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The cycle budget could not cover another run
    Budget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedAgent {
    pub agent_id: AgentId,
    pub reason: SkipReason,
}

/// Why a whole batch was skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchSkipReason {
    Paused { until: DateTime<Utc> },
    AgentsDisabled,
    NoEligibleAgents,
}

/// Result of one handler invocation: zero or more agent runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub runs: Vec<AgentRunReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedAgent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_skip: Option<BatchSkipReason>,
}

impl RunResult {
    pub fn single(report: AgentRunReport) -> Self {
        Self {
            runs: vec![report],
            ..Self::default()
        }
    }

    pub fn batch_skipped(reason: BatchSkipReason) -> Self {
        Self {
            batch_skip: Some(reason),
            ..Self::default()
        }
    }

    /// True when every run that happened recorded no error
    pub fn success(&self) -> bool {
        self.runs.iter().all(|r| r.success)
    }

    pub fn executed_action_count(&self) -> usize {
        self.runs.iter().map(|r| r.executed_actions.len()).sum()
    }

    pub fn total_usage(&self) -> Usage {
        let mut total = Usage::default();
        for run in &self.runs {
            total.add(&run.usage);
        }
        total
    }

    pub fn run_for(&self, agent_id: &str) -> Option<&AgentRunReport> {
        self.runs.iter().find(|r| r.agent_id.as_str() == agent_id)
    }
}
