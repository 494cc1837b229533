//! Workflow scope - what one run may observe and do

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::WorkflowTrigger;
use crate::domain::DomainError;

/// Agent identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role the actor plays in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Agent,
    System,
}

/// Who the run acts on behalf of
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: AgentId,
    pub role: ActorRole,
}

impl Actor {
    pub fn agent(id: impl Into<AgentId>) -> Self {
        Self {
            id: id.into(),
            role: ActorRole::Agent,
        }
    }
}

/// Kind of entity the run is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Post,
    Comment,
    User,
    Message,
    Battle,
    Proposal,
}

/// What the run is about, with a small opaque payload from the trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub kind: SubjectKind,
    #[serde(default)]
    pub payload: Value,
}

impl Subject {
    pub fn new(id: impl Into<String>, kind: SubjectKind) -> Self {
        Self {
            id: id.into(),
            kind,
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Named data domains a run may read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataDomain {
    Messages,
    Posts,
    Relationships,
    Communities,
    Memories,
}

impl DataDomain {
    pub const ALL: [DataDomain; 5] = [
        Self::Messages,
        Self::Posts,
        Self::Relationships,
        Self::Communities,
        Self::Memories,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Posts => "posts",
            Self::Relationships => "relationships",
            Self::Communities => "communities",
            Self::Memories => "memories",
        }
    }
}

impl fmt::Display for DataDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which posts a run may see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostFilter {
    ById { post_id: String },
    ByAuthor { author_id: String },
    ByCommunity { community_id: String },
    RecentFeed,
}

/// Which communities a run may see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommunityFilter {
    JoinedBy { user_id: String },
    ById { community_id: String },
    Suggested,
}

/// A domain together with its filter and limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainQuery {
    Messages { conversation_id: String, limit: usize },
    Posts { filter: PostFilter, limit: usize },
    Relationships { user_id: String },
    Communities { filter: CommunityFilter, limit: usize },
    Memories { user_id: String, limit: usize },
}

impl DomainQuery {
    pub fn domain(&self) -> DataDomain {
        match self {
            Self::Messages { .. } => DataDomain::Messages,
            Self::Posts { .. } => DataDomain::Posts,
            Self::Relationships { .. } => DataDomain::Relationships,
            Self::Communities { .. } => DataDomain::Communities,
            Self::Memories { .. } => DataDomain::Memories,
        }
    }
}

/// The set of readable domains, at most one query per domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataScope {
    queries: BTreeMap<DataDomain, DomainQuery>,
}

impl DataScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, domain: DataDomain) -> bool {
        self.queries.contains_key(&domain)
    }

    pub fn get(&self, domain: DataDomain) -> Option<&DomainQuery> {
        self.queries.get(&domain)
    }

    pub fn domains(&self) -> impl Iterator<Item = DataDomain> + '_ {
        self.queries.keys().copied()
    }

    pub fn queries(&self) -> impl Iterator<Item = &DomainQuery> {
        self.queries.values()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Action identifier. Open set: new actions need no engine change as long as
/// some scope lists them and a tool is registered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    pub const REPLY: &'static str = "REPLY";
    pub const COMMENT: &'static str = "COMMENT";
    pub const LIKE: &'static str = "LIKE";
    pub const JOIN_COMMUNITY: &'static str = "JOIN_COMMUNITY";
    pub const FOLLOW: &'static str = "FOLLOW";
    pub const IGNORE: &'static str = "IGNORE";
    pub const SUPPORT: &'static str = "SUPPORT";
    pub const OPPOSE: &'static str = "OPPOSE";
    pub const CHEER: &'static str = "CHEER";
    pub const SAVE_MEMORY: &'static str = "SAVE_MEMORY";
    /// Explicit "do nothing"; always allowed and never executed
    pub const NOOP: &'static str = "NOOP";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_ascii_uppercase())
    }

    pub fn noop() -> Self {
        Self(Self::NOOP.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_noop(&self) -> bool {
        self.0 == Self::NOOP
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inputs to one workflow run. Built once, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowScope {
    trigger: WorkflowTrigger,
    actor: Actor,
    subject: Subject,
    data_scope: DataScope,
    available_actions: BTreeSet<ActionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
}

impl WorkflowScope {
    pub fn builder(
        trigger: WorkflowTrigger,
        actor: Actor,
        subject: Subject,
    ) -> WorkflowScopeBuilder {
        WorkflowScopeBuilder {
            trigger,
            actor,
            subject,
            data_scope: DataScope::new(),
            available_actions: BTreeSet::new(),
            conversation_id: None,
        }
    }

    pub fn trigger(&self) -> &WorkflowTrigger {
        &self.trigger
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn data_scope(&self) -> &DataScope {
        &self.data_scope
    }

    pub fn available_actions(&self) -> &BTreeSet<ActionId> {
        &self.available_actions
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }
}

/// Builder for WorkflowScope
#[derive(Debug)]
pub struct WorkflowScopeBuilder {
    trigger: WorkflowTrigger,
    actor: Actor,
    subject: Subject,
    data_scope: DataScope,
    available_actions: BTreeSet<ActionId>,
    conversation_id: Option<String>,
}

impl WorkflowScopeBuilder {
    /// Grant a domain; a second query for the same domain replaces the first
    pub fn query(mut self, query: DomainQuery) -> Self {
        self.data_scope.queries.insert(query.domain(), query);
        self
    }

    pub fn action(mut self, action: impl Into<ActionId>) -> Self {
        self.available_actions.insert(action.into());
        self
    }

    pub fn actions<I, A>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ActionId>,
    {
        self.available_actions
            .extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn build(self) -> Result<WorkflowScope, DomainError> {
        if self.available_actions.iter().any(ActionId::is_noop) {
            return Err(DomainError::validation(
                "NOOP is implicit and must not be listed as an available action",
            ));
        }

        if let Some(DomainQuery::Messages { conversation_id, .. }) =
            self.data_scope.get(DataDomain::Messages)
        {
            if self
                .conversation_id
                .as_deref()
                .is_some_and(|c| c != conversation_id)
            {
                return Err(DomainError::validation(
                    "Message query must target the scope's conversation",
                ));
            }
        }

        Ok(WorkflowScope {
            trigger: self.trigger,
            actor: self.actor,
            subject: self.subject,
            data_scope: self.data_scope,
            available_actions: self.available_actions,
            conversation_id: self.conversation_id,
        })
    }
}
