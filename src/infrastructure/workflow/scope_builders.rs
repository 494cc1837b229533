//! Scope builders - one per workflow type
//!
//! Builders resolve trigger identifiers through [`EntityLookup`] and assemble
//! the smallest scope the workflow needs. They never call the model and never
//! execute actions.

use std::sync::Arc;

use serde_json::json;

use crate::config::OrchestratorConfig;
use crate::domain::scope::{CommunityFilter, PostFilter};
use crate::domain::social::{CommentRecord, ConversationRecord, MessageRecord, PostRecord};
use crate::domain::{
    ActionId, Actor, DomainQuery, EntityLookup, MentionTarget, Subject, SubjectKind, WorkflowError,
    WorkflowKey, WorkflowScope, WorkflowTrigger,
};

/// Per-domain read limits applied by every builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLimits {
    pub messages: usize,
    pub posts: usize,
    pub communities: usize,
    pub memories: usize,
}

impl Default for ScopeLimits {
    fn default() -> Self {
        Self {
            messages: 20,
            posts: 20,
            communities: 10,
            memories: 10,
        }
    }
}

impl From<&OrchestratorConfig> for ScopeLimits {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            messages: config.message_limit,
            posts: config.post_limit,
            communities: config.community_limit,
            memories: config.memory_limit,
        }
    }
}

pub struct ScopeBuilders {
    lookup: Arc<dyn EntityLookup>,
    limits: ScopeLimits,
}

impl std::fmt::Debug for ScopeBuilders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeBuilders")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl ScopeBuilders {
    pub fn new(lookup: Arc<dyn EntityLookup>, limits: ScopeLimits) -> Self {
        Self { lookup, limits }
    }

    pub fn limits(&self) -> ScopeLimits {
        self.limits
    }

    async fn message(&self, id: &str) -> Result<MessageRecord, WorkflowError> {
        self.lookup
            .find_message(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("Message '{}' not found", id)))
    }

    async fn conversation(&self, id: &str) -> Result<ConversationRecord, WorkflowError> {
        self.lookup
            .find_conversation(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("Conversation '{}' not found", id)))
    }

    async fn post(&self, id: &str) -> Result<PostRecord, WorkflowError> {
        self.lookup
            .find_post(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("Post '{}' not found", id)))
    }

    async fn comment(&self, id: &str) -> Result<CommentRecord, WorkflowError> {
        self.lookup
            .find_comment(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("Comment '{}' not found", id)))
    }

    fn messages_query(&self, conversation_id: &str) -> DomainQuery {
        DomainQuery::Messages {
            conversation_id: conversation_id.to_string(),
            limit: self.limits.messages,
        }
    }

    fn post_query(&self, post_id: &str) -> DomainQuery {
        DomainQuery::Posts {
            filter: PostFilter::ById {
                post_id: post_id.to_string(),
            },
            limit: 1,
        }
    }

    fn memories_query(&self, agent_id: &str) -> DomainQuery {
        DomainQuery::Memories {
            user_id: agent_id.to_string(),
            limit: self.limits.memories,
        }
    }

    fn relationships_query(user_id: &str) -> DomainQuery {
        DomainQuery::Relationships {
            user_id: user_id.to_string(),
        }
    }

    /// Direct message sent to an agent
    pub async fn direct_message_chat(
        &self,
        trigger: WorkflowTrigger,
        agent_id: &str,
        message_id: &str,
    ) -> Result<WorkflowScope, WorkflowError> {
        let message = self.message(message_id).await?;
        let conversation = self.conversation(&message.conversation_id).await?;

        if !conversation.has_participant(agent_id) {
            return Err(WorkflowError::not_found(format!(
                "Agent '{}' is not part of conversation '{}'",
                agent_id, conversation.id
            )));
        }

        let scope = WorkflowScope::builder(
            trigger,
            Actor::agent(agent_id),
            Subject::new(&message.id, SubjectKind::Message).with_payload(json!({
                "sender_id": message.sender_id,
                "content": message.content,
            })),
        )
        .conversation(&conversation.id)
        .query(self.messages_query(&conversation.id))
        .query(Self::relationships_query(&message.sender_id))
        .query(self.memories_query(agent_id))
        .actions([ActionId::REPLY, ActionId::IGNORE])
        .build()?;

        Ok(scope)
    }

    /// Someone commented on a post written by the agent. The actor is the post author.
    pub async fn comment_on_agent_post(
        &self,
        trigger: WorkflowTrigger,
        comment_id: &str,
    ) -> Result<WorkflowScope, WorkflowError> {
        let comment = self.comment(comment_id).await?;
        let post = self.post(&comment.post_id).await?;

        let scope = WorkflowScope::builder(
            trigger,
            Actor::agent(post.author_id.as_str()),
            Subject::new(&comment.id, SubjectKind::Comment).with_payload(json!({
                "post_id": post.id,
                "author_id": comment.author_id,
                "content": comment.content,
            })),
        )
        .query(self.post_query(&post.id))
        .query(Self::relationships_query(&comment.author_id))
        .query(self.memories_query(&post.author_id))
        .actions([ActionId::REPLY, ActionId::LIKE, ActionId::IGNORE])
        .build()?;

        Ok(scope)
    }

    /// The agent was mentioned somewhere
    pub async fn mention(
        &self,
        trigger: WorkflowTrigger,
        agent_id: &str,
        target: &MentionTarget,
    ) -> Result<WorkflowScope, WorkflowError> {
        match target {
            MentionTarget::Post { post_id } => self.post_mention(trigger, agent_id, post_id).await,
            MentionTarget::Comment {
                post_id,
                comment_id,
            } => {
                self.comment_mention(trigger, agent_id, post_id, comment_id)
                    .await
            }
            MentionTarget::DirectMessage { conversation_id } => {
                self.conversation_mention(trigger, agent_id, conversation_id, false)
                    .await
            }
            MentionTarget::GroupMessage {
                group_conversation_id,
            } => {
                self.conversation_mention(trigger, agent_id, group_conversation_id, true)
                    .await
            }
        }
    }

    async fn post_mention(
        &self,
        trigger: WorkflowTrigger,
        agent_id: &str,
        post_id: &str,
    ) -> Result<WorkflowScope, WorkflowError> {
        let post = self.post(post_id).await?;

        let scope = WorkflowScope::builder(
            trigger,
            Actor::agent(agent_id),
            Subject::new(&post.id, SubjectKind::Post).with_payload(json!({
                "author_id": post.author_id,
                "content": post.content,
            })),
        )
        .query(self.post_query(&post.id))
        .query(Self::relationships_query(&post.author_id))
        .query(self.memories_query(agent_id))
        .actions([ActionId::COMMENT, ActionId::LIKE, ActionId::IGNORE])
        .build()?;

        Ok(scope)
    }

    async fn comment_mention(
        &self,
        trigger: WorkflowTrigger,
        agent_id: &str,
        post_id: &str,
        comment_id: &str,
    ) -> Result<WorkflowScope, WorkflowError> {
        let comment = self.comment(comment_id).await?;

        if comment.post_id != post_id {
            return Err(WorkflowError::not_found(format!(
                "Comment '{}' does not belong to post '{}'",
                comment_id, post_id
            )));
        }

        let scope = WorkflowScope::builder(
            trigger,
            Actor::agent(agent_id),
            Subject::new(&comment.id, SubjectKind::Comment).with_payload(json!({
                "post_id": comment.post_id,
                "author_id": comment.author_id,
                "content": comment.content,
            })),
        )
        .query(self.post_query(&comment.post_id))
        .query(Self::relationships_query(&comment.author_id))
        .query(self.memories_query(agent_id))
        .actions([ActionId::REPLY, ActionId::LIKE, ActionId::IGNORE])
        .build()?;

        Ok(scope)
    }

    async fn conversation_mention(
        &self,
        trigger: WorkflowTrigger,
        agent_id: &str,
        conversation_id: &str,
        group: bool,
    ) -> Result<WorkflowScope, WorkflowError> {
        let conversation = self.conversation(conversation_id).await?;

        if conversation.is_group != group {
            return Err(WorkflowError::not_found(format!(
                "Conversation '{}' is not a {} conversation",
                conversation_id,
                if group { "group" } else { "direct" }
            )));
        }

        if !conversation.has_participant(agent_id) {
            return Err(WorkflowError::not_found(format!(
                "Agent '{}' is not part of conversation '{}'",
                agent_id, conversation.id
            )));
        }

        let mut builder = WorkflowScope::builder(
            trigger,
            Actor::agent(agent_id),
            Subject::new(&conversation.id, SubjectKind::Message).with_payload(json!({
                "participants": conversation.participant_ids,
                "group": conversation.is_group,
            })),
        )
        .conversation(&conversation.id)
        .query(self.messages_query(&conversation.id))
        .query(self.memories_query(agent_id))
        .actions([ActionId::REPLY, ActionId::IGNORE]);

        // a direct conversation has exactly one counterpart worth looking up
        if !group {
            if let Some(other) = conversation
                .participant_ids
                .iter()
                .find(|p| p.as_str() != agent_id)
            {
                builder = builder.query(Self::relationships_query(other));
            }
        }

        Ok(builder.build()?)
    }

    /// A new post the agent may react to
    pub async fn new_post(
        &self,
        trigger: WorkflowTrigger,
        agent_id: &str,
        post_id: &str,
    ) -> Result<WorkflowScope, WorkflowError> {
        let post = self.post(post_id).await?;

        let mut builder = WorkflowScope::builder(
            trigger,
            Actor::agent(agent_id),
            Subject::new(&post.id, SubjectKind::Post).with_payload(json!({
                "author_id": post.author_id,
                "community_id": post.community_id,
                "content": post.content,
            })),
        )
        .query(self.post_query(&post.id))
        .query(Self::relationships_query(&post.author_id))
        .actions([
            ActionId::COMMENT,
            ActionId::LIKE,
            ActionId::FOLLOW,
            ActionId::IGNORE,
        ]);

        if let Some(community_id) = &post.community_id {
            builder = builder.query(DomainQuery::Communities {
                filter: CommunityFilter::ById {
                    community_id: community_id.clone(),
                },
                limit: 1,
            });

            if !self.lookup.is_member(agent_id, community_id).await? {
                builder = builder.action(ActionId::JOIN_COMMUNITY);
            }
        }

        Ok(builder.build()?)
    }

    /// A law proposal put to a vote
    pub fn law_proposal(
        &self,
        trigger: WorkflowTrigger,
        agent_id: &str,
        proposal_id: &str,
        payload: serde_json::Value,
    ) -> Result<WorkflowScope, WorkflowError> {
        let scope = WorkflowScope::builder(
            trigger,
            Actor::agent(agent_id),
            Subject::new(proposal_id, SubjectKind::Proposal).with_payload(payload),
        )
        .query(self.memories_query(agent_id))
        .actions([ActionId::SUPPORT, ActionId::OPPOSE, ActionId::IGNORE])
        .build()?;

        Ok(scope)
    }

    /// A battle other agents may cheer on
    pub fn battle(
        &self,
        trigger: WorkflowTrigger,
        agent_id: &str,
        battle_id: &str,
        payload: serde_json::Value,
    ) -> Result<WorkflowScope, WorkflowError> {
        let scope = WorkflowScope::builder(
            trigger,
            Actor::agent(agent_id),
            Subject::new(battle_id, SubjectKind::Battle).with_payload(payload),
        )
        .query(self.memories_query(agent_id))
        .actions([ActionId::CHEER, ActionId::COMMENT, ActionId::IGNORE])
        .build()?;

        Ok(scope)
    }

    /// Periodic cycle for one agent
    pub fn scheduled_cycle(
        &self,
        key: WorkflowKey,
        agent_id: &str,
    ) -> Result<WorkflowScope, WorkflowError> {
        let builder = WorkflowScope::builder(
            WorkflowTrigger::schedule(key),
            Actor::agent(agent_id),
            Subject::new(agent_id, SubjectKind::User),
        );

        let recent_feed = DomainQuery::Posts {
            filter: PostFilter::RecentFeed,
            limit: self.limits.posts,
        };

        let builder = match key {
            WorkflowKey::AgentActivityCycle => builder
                .query(recent_feed)
                .query(DomainQuery::Communities {
                    filter: CommunityFilter::JoinedBy {
                        user_id: agent_id.to_string(),
                    },
                    limit: self.limits.communities,
                })
                .query(self.memories_query(agent_id))
                .actions([ActionId::COMMENT, ActionId::LIKE, ActionId::FOLLOW]),
            WorkflowKey::FeedEngagement => builder
                .query(recent_feed)
                .actions([ActionId::COMMENT, ActionId::LIKE]),
            WorkflowKey::CommunityDiscovery => builder
                .query(DomainQuery::Communities {
                    filter: CommunityFilter::Suggested,
                    limit: self.limits.communities,
                })
                .action(ActionId::JOIN_COMMUNITY),
            WorkflowKey::MemoryReflection => builder
                .query(DomainQuery::Posts {
                    filter: PostFilter::ByAuthor {
                        author_id: agent_id.to_string(),
                    },
                    limit: self.limits.posts,
                })
                .query(self.memories_query(agent_id))
                .action(ActionId::SAVE_MEMORY),
        };

        Ok(builder.build()?)
    }
}
