//! Workflow domain module
//!
//! A workflow run is one agent going through the perceive/reason/act loop
//! inside a [`WorkflowScope`](crate::domain::scope::WorkflowScope):
//! - data tools load the domains the scope grants (Observing)
//! - a [`DecisionMaker`] picks at most one action (Reasoning)
//! - an action tool executes it (Acting), then side effects fire in the background
//!
//! Handlers turn a trigger context into one or more runs and report a
//! [`RunResult`].

mod decision;
mod effects;
mod error;
mod executor;
mod handler;
mod result;
mod state;
mod tools;

pub use decision::{Decision, DecisionError, DecisionMaker, DecisionOutcome};
pub use effects::{ActionEvent, SideEffect};
pub use error::WorkflowError;
pub use executor::AgentOrchestrator;
pub use handler::{TriggerContext, TriggerKey, WorkflowHandler};
pub use result::{AgentRunReport, BatchSkipReason, RunResult, SkipReason, SkippedAgent};
pub use state::{AgentRunState, ExecutedAction, RunError, RunErrorKind, RunPhase};
pub use tools::{ActionTool, DataTool, Observation};
