//! Orchestrator trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::AgentRunState;
use crate::domain::scope::WorkflowScope;

/// Runs the perceive/reason/act loop for one scope.
///
/// Never fails as a whole: every failure ends up on the returned state.
#[async_trait]
pub trait AgentOrchestrator: Send + Sync + Debug {
    async fn run(&self, scope: &WorkflowScope) -> AgentRunState;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::domain::llm::Usage;
    use crate::domain::scope::ActionId;

    /// Orchestrator that records scopes and optionally performs one action.
    /// Tracks the peak number of concurrent runs.
    #[derive(Debug, Default)]
    pub struct MockOrchestrator {
        action: Option<ActionId>,
        delay: Option<Duration>,
        tokens_per_run: u32,
        panic_for: Option<String>,
        scopes: Mutex<Vec<WorkflowScope>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockOrchestrator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn acting(mut self, action: impl Into<ActionId>) -> Self {
            self.action = Some(action.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Report this many completion tokens per run
        pub fn spending(mut self, tokens: u32) -> Self {
            self.tokens_per_run = tokens;
            self
        }

        /// Panic inside the run for this agent
        pub fn panicking_for(mut self, agent_id: impl Into<String>) -> Self {
            self.panic_for = Some(agent_id.into());
            self
        }

        pub fn scopes(&self) -> Vec<WorkflowScope> {
            self.scopes.lock().unwrap().clone()
        }

        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AgentOrchestrator for MockOrchestrator {
        async fn run(&self, scope: &WorkflowScope) -> AgentRunState {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            self.scopes.lock().unwrap().push(scope.clone());

            if self.panic_for.as_deref() == Some(scope.actor().id.as_str()) {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("orchestrator crashed for {}", scope.actor().id);
            }

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = AgentRunState::new(scope.actor().id.clone(), Utc::now());
            state.iteration = 1;
            state.usage = Usage::new(0, self.tokens_per_run);
            if let Some(action) = &self.action {
                state.record_action(action.clone(), Value::Null, Value::Null);
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            state
        }
    }
}
