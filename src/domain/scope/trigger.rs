//! Triggers - why a workflow run starts

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Inbound social event kinds the router dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Chat,
    Comment,
    Mention,
    Post,
    LawProposal,
    Battle,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        Self::Chat,
        Self::Comment,
        Self::Mention,
        Self::Post,
        Self::LawProposal,
        Self::Battle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Comment => "comment",
            Self::Mention => "mention",
            Self::Post => "post",
            Self::LawProposal => "law_proposal",
            Self::Battle => "battle",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::configuration(format!("Unknown event kind '{}'", s)))
    }
}

/// Scheduled workflow keys.
///
/// Schedule records persist keys as strings; parsing rejects unknown keys so a
/// misconfigured record fails loudly instead of silently never running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKey {
    /// Periodic simulation tick: agents browse and engage with the feed
    AgentActivityCycle,
    /// Agents revisit recent posts from accounts they follow
    FeedEngagement,
    /// Agents look for communities to join
    CommunityDiscovery,
    /// Agents reflect on recent memories and relationships
    MemoryReflection,
}

impl WorkflowKey {
    pub const ALL: [WorkflowKey; 4] = [
        Self::AgentActivityCycle,
        Self::FeedEngagement,
        Self::CommunityDiscovery,
        Self::MemoryReflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentActivityCycle => "agent_activity_cycle",
            Self::FeedEngagement => "feed_engagement",
            Self::CommunityDiscovery => "community_discovery",
            Self::MemoryReflection => "memory_reflection",
        }
    }
}

impl fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::configuration(format!("Unknown workflow key '{}'", s)))
    }
}

/// The reason a workflow run started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowTrigger {
    Event {
        kind: EventKind,
        timestamp: DateTime<Utc>,
        /// The event is itself a reply to something the actor did
        is_response: bool,
    },
    Schedule {
        key: WorkflowKey,
    },
}

impl WorkflowTrigger {
    pub fn event(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self::Event {
            kind,
            timestamp,
            is_response: false,
        }
    }

    pub fn response(kind: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self::Event {
            kind,
            timestamp,
            is_response: true,
        }
    }

    pub fn schedule(key: WorkflowKey) -> Self {
        Self::Schedule { key }
    }

    /// Short label for logs and prompts
    pub fn label(&self) -> String {
        match self {
            Self::Event { kind, .. } => format!("event:{}", kind),
            Self::Schedule { key } => format!("schedule:{}", key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_workflow_key_is_configuration_error() {
        let err = "nightly_cleanup".parse::<WorkflowKey>().unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_trigger_label() {
        let trigger = WorkflowTrigger::schedule(WorkflowKey::FeedEngagement);
        assert_eq!(trigger.label(), "schedule:feed_engagement");

        let trigger = WorkflowTrigger::event(EventKind::LawProposal, Utc::now());
        assert_eq!(trigger.label(), "event:law_proposal");
    }
}
