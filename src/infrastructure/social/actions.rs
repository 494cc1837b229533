//! Action tools that apply agent decisions to the in-memory store

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::in_memory::{InMemorySocialStore, PerformedAction};
use crate::domain::scope::SubjectKind;
use crate::domain::social::{CommentRecord, MemoryRecord, MessageRecord};
use crate::domain::{ActionId, ActionTool, DomainError, WorkflowScope};

const DEFAULT_MEMORY_IMPORTANCE: f64 = 0.5;

/// Every action id the store knows how to apply
pub fn store_actions(store: Arc<InMemorySocialStore>) -> Vec<Arc<dyn ActionTool>> {
    [
        ActionId::REPLY,
        ActionId::COMMENT,
        ActionId::LIKE,
        ActionId::FOLLOW,
        ActionId::JOIN_COMMUNITY,
        ActionId::SAVE_MEMORY,
        ActionId::SUPPORT,
        ActionId::OPPOSE,
        ActionId::CHEER,
        ActionId::IGNORE,
    ]
    .into_iter()
    .map(|action| Arc::new(StoreActionTool::new(store.clone(), action)) as Arc<dyn ActionTool>)
    .collect()
}

/// Applies one action id on behalf of the scope's actor.
///
/// Targets come from the decision's params first, then from the subject.
/// Ids without a store mutation (votes, cheers, IGNORE) are only journaled.
#[derive(Debug)]
pub struct StoreActionTool {
    store: Arc<InMemorySocialStore>,
    action: ActionId,
}

impl StoreActionTool {
    pub fn new(store: Arc<InMemorySocialStore>, action: impl Into<ActionId>) -> Self {
        Self {
            store,
            action: action.into(),
        }
    }

    fn reply(&self, scope: &WorkflowScope, params: &Value) -> Result<Value, DomainError> {
        let content = required_param(params, "content")?;
        let actor = scope.actor().id.as_str();

        if let Some(conversation_id) = scope.conversation_id() {
            let id = Uuid::new_v4().to_string();
            self.store.add_message(MessageRecord {
                id: id.clone(),
                conversation_id: conversation_id.to_string(),
                sender_id: actor.to_string(),
                content: content.to_string(),
                created_at: Utc::now(),
            })?;
            return Ok(json!({ "message_id": id }));
        }

        if scope.subject().kind == SubjectKind::Comment {
            let post_id = subject_field(scope, "post_id")
                .ok_or_else(|| DomainError::validation("Comment subject has no post_id"))?;
            let id = self.add_comment(post_id, actor, content)?;
            return Ok(json!({ "comment_id": id }));
        }

        Err(DomainError::validation(format!(
            "Nothing to reply to for subject '{}'",
            scope.subject().id
        )))
    }

    fn comment(&self, scope: &WorkflowScope, params: &Value) -> Result<Value, DomainError> {
        let content = required_param(params, "content")?;
        let subject = scope.subject();
        let post_id = param(params, "post_id")
            .or(match subject.kind {
                SubjectKind::Post => Some(subject.id.as_str()),
                SubjectKind::Comment => subject_field(scope, "post_id"),
                _ => None,
            })
            .ok_or_else(|| DomainError::validation("COMMENT needs a post_id"))?;

        let id = self.add_comment(post_id, scope.actor().id.as_str(), content)?;
        Ok(json!({ "comment_id": id, "post_id": post_id }))
    }

    fn add_comment(
        &self,
        post_id: &str,
        author: &str,
        content: &str,
    ) -> Result<String, DomainError> {
        let id = Uuid::new_v4().to_string();
        self.store.add_comment(CommentRecord {
            id: id.clone(),
            post_id: post_id.to_string(),
            author_id: author.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        })?;
        Ok(id)
    }

    fn save_memory(&self, scope: &WorkflowScope, params: &Value) -> Result<Value, DomainError> {
        let content = required_param(params, "content")?;
        let importance = params
            .get("importance")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_MEMORY_IMPORTANCE)
            .clamp(0.0, 1.0);

        let id = Uuid::new_v4().to_string();
        self.store.add_memory(MemoryRecord {
            id: id.clone(),
            user_id: scope.actor().id.as_str().to_string(),
            content: content.to_string(),
            importance: importance as f32,
            created_at: Utc::now(),
        })?;
        Ok(json!({ "memory_id": id }))
    }

    fn apply(&self, scope: &WorkflowScope, params: &Value) -> Result<Value, DomainError> {
        let actor = scope.actor().id.as_str();
        let subject = scope.subject();

        match self.action.as_str() {
            ActionId::REPLY => self.reply(scope, params),
            ActionId::COMMENT => self.comment(scope, params),
            ActionId::LIKE => {
                let target = param(params, "target_id").unwrap_or(subject.id.as_str());
                let liked = self.store.like(actor, target)?;
                Ok(json!({ "target_id": target, "liked": liked }))
            }
            ActionId::FOLLOW => {
                let user = param(params, "user_id")
                    .or_else(|| subject_field(scope, "author_id"))
                    .ok_or_else(|| DomainError::validation("FOLLOW needs a user_id"))?;
                let followed = self.store.follow(actor, user)?;
                Ok(json!({ "user_id": user, "followed": followed }))
            }
            ActionId::JOIN_COMMUNITY => {
                let community = param(params, "community_id")
                    .or_else(|| subject_field(scope, "community_id"))
                    .ok_or_else(|| DomainError::validation("JOIN_COMMUNITY needs a community_id"))?;
                let joined = self.store.join_community(actor, community)?;
                Ok(json!({ "community_id": community, "joined": joined }))
            }
            ActionId::SAVE_MEMORY => self.save_memory(scope, params),
            _ => Ok(json!({ "recorded": true })),
        }
    }
}

fn param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, DomainError> {
    param(params, key)
        .ok_or_else(|| DomainError::validation(format!("Missing '{}' parameter", key)))
}

fn subject_field<'a>(scope: &'a WorkflowScope, key: &str) -> Option<&'a str> {
    scope.subject().payload.get(key).and_then(Value::as_str)
}

#[async_trait]
impl ActionTool for StoreActionTool {
    fn action_id(&self) -> ActionId {
        self.action.clone()
    }

    async fn execute(&self, scope: &WorkflowScope, params: &Value) -> Result<Value, DomainError> {
        let output = self.apply(scope, params)?;

        self.store.record_action(PerformedAction {
            agent_id: scope.actor().id.as_str().to_string(),
            action: self.action.clone(),
            subject_id: scope.subject().id.clone(),
            params: params.clone(),
            performed_at: Utc::now(),
        })?;

        Ok(output)
    }
}
