//! Decision maker backed by the completion service

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::domain::workflow::{Decision, DecisionError, DecisionMaker, DecisionOutcome, Observation};
use crate::domain::{ActionId, AgentRunState, CompletionRequest, CompletionService, WorkflowScope};

/// Asks the model for one JSON decision per iteration.
///
/// The answer may arrive as a tool call or as text; text is parsed leniently
/// (bare object, fenced block, or the first embedded object).
#[derive(Debug)]
pub struct LlmDecisionMaker {
    completions: Arc<dyn CompletionService>,
    model: Option<String>,
}

impl LlmDecisionMaker {
    pub fn new(completions: Arc<dyn CompletionService>) -> Self {
        Self {
            completions,
            model: None,
        }
    }

    /// Request a specific model first; the chain still falls back
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn system_prompt(scope: &WorkflowScope) -> String {
        let mut actions: Vec<&str> =
            scope.available_actions().iter().map(ActionId::as_str).collect();
        actions.push(ActionId::NOOP);

        let subject = scope.subject();

        format!(
            "You are agent '{actor}' acting in a social world.\n\
             Trigger: {trigger}. Subject: {kind:?} '{subject_id}'.\n\
             Choose exactly one action from: {actions}.\n\
             Use NOOP when nothing should be done.\n\
             Answer with a single JSON object: \
             {{\"action\": string, \"params\": object, \
             \"continue\": boolean, \"reasoning\": string}}",
            actor = scope.actor().id,
            trigger = scope.trigger().label(),
            kind = subject.kind,
            subject_id = subject.id,
            actions = actions.join(", "),
        )
    }

    fn user_prompt(
        scope: &WorkflowScope,
        observation: &Observation,
        state: &AgentRunState,
    ) -> String {
        let done: Vec<Value> = state
            .executed_actions
            .iter()
            .map(|a| json!({ "action": a.action, "iteration": a.iteration, "params": a.params }))
            .collect();

        let context = json!({
            "iteration": state.iteration,
            "subject": scope.subject().payload,
            "observation": observation.to_value(),
            "executed_actions": done,
        });

        format!("Context:\n{}", context)
    }
}

#[async_trait]
impl DecisionMaker for LlmDecisionMaker {
    async fn decide(
        &self,
        scope: &WorkflowScope,
        observation: &Observation,
        state: &AgentRunState,
    ) -> Result<DecisionOutcome, DecisionError> {
        let mut builder = CompletionRequest::builder()
            .system(Self::system_prompt(scope))
            .user(Self::user_prompt(scope, observation, state))
            .json_mode(true);

        if let Some(model) = &self.model {
            builder = builder.model(model.clone());
        }

        let response = self.completions.complete(builder.build()).await?;

        let decision = match response.tool_calls.first() {
            Some(call) => Decision::from_value(call.arguments.clone())?,
            None => Decision::parse(&response.content)?,
        };

        Ok(DecisionOutcome {
            decision,
            model: response.model,
            usage: response.usage,
        })
    }
}
