//! Decisions produced by the reasoning step

use std::fmt::Debug;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{AgentRunState, Observation};
use crate::domain::llm::{CompletionError, Usage};
use crate::domain::scope::{ActionId, WorkflowScope};

/// Fenced ```json ... ``` block inside a model answer
static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid fenced json pattern")
});

/// What the model chose to do this iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: ActionId,
    #[serde(default)]
    pub params: Value,
    /// Ask for another observe/reason/act iteration
    #[serde(default, rename = "continue")]
    pub continue_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDecision {
    action: Option<String>,
    #[serde(default, alias = "parameters")]
    params: Value,
    #[serde(default, rename = "continue")]
    continue_run: bool,
    #[serde(default)]
    reasoning: Option<String>,
}

impl Decision {
    pub fn noop() -> Self {
        Self {
            action: ActionId::noop(),
            params: Value::Null,
            continue_run: false,
            reasoning: None,
        }
    }

    pub fn act(action: impl Into<ActionId>) -> Self {
        Self {
            action: action.into(),
            ..Self::noop()
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn continuing(mut self) -> Self {
        self.continue_run = true;
        self
    }

    /// Parse a decision out of a JSON value (tool-call arguments)
    pub fn from_value(value: Value) -> Result<Self, DecisionError> {
        let raw: RawDecision = serde_json::from_value(value)
            .map_err(|e| DecisionError::malformed(format!("Invalid decision object: {}", e)))?;

        let action = raw
            .action
            .filter(|a| !a.trim().is_empty())
            .map(ActionId::new)
            .ok_or_else(|| DecisionError::malformed("Decision is missing an action"))?;

        Ok(Self {
            action,
            params: raw.params,
            continue_run: raw.continue_run,
            reasoning: raw.reasoning,
        })
    }

    /// Parse a decision out of free text: bare JSON, a fenced block, or the
    /// first `{...}` span
    pub fn parse(text: &str) -> Result<Self, DecisionError> {
        let trimmed = text.trim();

        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return Self::from_value(value);
        }

        if let Some(block) = FENCED_JSON.captures(trimmed).and_then(|c| c.get(1)) {
            let value = serde_json::from_str::<Value>(block.as_str())
                .map_err(|e| DecisionError::malformed(format!("Invalid fenced JSON: {}", e)))?;
            return Self::from_value(value);
        }

        match (trimmed.find('{'), trimmed.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                let value = serde_json::from_str::<Value>(&trimmed[start..=end])
                    .map_err(|e| DecisionError::malformed(format!("Invalid JSON span: {}", e)))?;
                Self::from_value(value)
            }
            _ => Err(DecisionError::malformed("Answer contains no decision object")),
        }
    }
}

/// A decision plus bookkeeping about how it was obtained
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub decision: Decision,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecisionError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Malformed decision: {0}")]
    Malformed(String),
}

impl DecisionError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Opaque decision function: turns an observation into one decision.
///
/// Prompt composition lives entirely behind this trait.
#[async_trait]
pub trait DecisionMaker: Send + Sync + Debug {
    async fn decide(
        &self,
        scope: &WorkflowScope,
        observation: &Observation,
        state: &AgentRunState,
    ) -> Result<DecisionOutcome, DecisionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bare_json() {
        let decision =
            Decision::parse(r#"{"action": "reply", "params": {"text": "hi"}, "continue": true}"#)
                .unwrap();

        assert_eq!(decision.action.as_str(), "REPLY");
        assert_eq!(decision.params, json!({"text": "hi"}));
        assert!(decision.continue_run);
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "I think so.\n```json\n{\"action\": \"LIKE\", \"reasoning\": \"nice\"}\n```";
        let decision = Decision::parse(text).unwrap();

        assert_eq!(decision.action.as_str(), "LIKE");
        assert!(!decision.continue_run);
        assert_eq!(decision.reasoning.as_deref(), Some("nice"));
    }

    #[test]
    fn test_parse_embedded_span_with_parameters_alias() {
        let text = "Decision: {\"action\": \"comment\", \"parameters\": {\"text\": \"wow\"}} done";
        let decision = Decision::parse(text).unwrap();

        assert_eq!(decision.action.as_str(), "COMMENT");
        assert_eq!(decision.params["text"], "wow");
    }

    #[test]
    fn test_parse_rejects_missing_action() {
        assert!(matches!(
            Decision::parse(r#"{"continue": true}"#),
            Err(DecisionError::Malformed(_))
        ));
        assert!(Decision::parse("I would rather not.").is_err());
    }
}
