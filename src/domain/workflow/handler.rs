//! Workflow handlers and the typed keys they are registered under

use std::fmt::{self, Debug};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{RunResult, WorkflowError};
use crate::domain::scope::{EventKind, MentionFields, WorkflowKey};

/// Registry key: an event kind or a schedule key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "key", rename_all = "snake_case")]
pub enum TriggerKey {
    Event(EventKind),
    Schedule(WorkflowKey),
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Event(kind) => write!(f, "event:{}", kind),
            Self::Schedule(key) => write!(f, "schedule:{}", key),
        }
    }
}

impl From<EventKind> for TriggerKey {
    fn from(kind: EventKind) -> Self {
        Self::Event(kind)
    }
}

impl From<WorkflowKey> for TriggerKey {
    fn from(key: WorkflowKey) -> Self {
        Self::Schedule(key)
    }
}

/// Trigger-specific identifiers handed to a handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    /// Agent the event is addressed to (chat recipient, mentioned agent, post author)
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub proposal_id: Option<String>,
    #[serde(default)]
    pub battle_id: Option<String>,
    #[serde(default)]
    pub mention: MentionFields,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_response: bool,
}

impl TriggerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_message(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn with_comment(mut self, comment_id: impl Into<String>) -> Self {
        self.comment_id = Some(comment_id.into());
        self
    }

    pub fn with_post(mut self, post_id: impl Into<String>) -> Self {
        self.post_id = Some(post_id.into());
        self
    }

    pub fn with_proposal(mut self, proposal_id: impl Into<String>) -> Self {
        self.proposal_id = Some(proposal_id.into());
        self
    }

    pub fn with_battle(mut self, battle_id: impl Into<String>) -> Self {
        self.battle_id = Some(battle_id.into());
        self
    }

    pub fn with_mention(mut self, mention: MentionFields) -> Self {
        self.mention = mention;
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn as_response(mut self) -> Self {
        self.is_response = true;
        self
    }

    /// Event time, falling back to now
    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or_else(Utc::now)
    }

    /// A required identifier; absence is a configuration error of the caller
    pub fn require<'a>(
        field: &'a Option<String>,
        name: &str,
    ) -> Result<&'a str, WorkflowError> {
        field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                WorkflowError::configuration(format!("Trigger context is missing '{}'", name))
            })
    }
}

/// A workflow bound to one trigger key
#[async_trait]
pub trait WorkflowHandler: Send + Sync + Debug {
    /// Handler name used in logs and errors
    fn name(&self) -> &str;

    async fn handle(&self, context: TriggerContext) -> Result<RunResult, WorkflowError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Handler recording its invocations
    #[derive(Debug, Default)]
    pub struct RecordingHandler {
        name: String,
        contexts: Mutex<Vec<TriggerContext>>,
    }

    impl RecordingHandler {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                contexts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.contexts.lock().unwrap().len()
        }

        pub fn contexts(&self) -> Vec<TriggerContext> {
            self.contexts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkflowHandler for RecordingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, context: TriggerContext) -> Result<RunResult, WorkflowError> {
            self.contexts.lock().unwrap().push(context);
            Ok(RunResult::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_key_display() {
        assert_eq!(TriggerKey::Event(EventKind::Chat).to_string(), "event:chat");
        assert_eq!(
            TriggerKey::from(WorkflowKey::FeedEngagement).to_string(),
            "schedule:feed_engagement"
        );
    }

    #[test]
    fn test_require_rejects_blank() {
        let context = TriggerContext::new().with_message("  ");
        assert!(TriggerContext::require(&context.message_id, "message_id").is_err());
        assert!(TriggerContext::require(&context.post_id, "post_id")
            .unwrap_err()
            .is_configuration());

        let context = TriggerContext::new().with_message("m1");
        assert_eq!(
            TriggerContext::require(&context.message_id, "message_id").unwrap(),
            "m1"
        );
    }
}
