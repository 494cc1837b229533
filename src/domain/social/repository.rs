//! Persistence ports consumed by scope builders, data tools and batches

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use super::{
    CommentRecord, CommunityRecord, ConversationRecord, MemoryRecord, MessageRecord, PostRecord,
    Relationship,
};
use crate::domain::error::DomainError;
use crate::domain::scope::{AgentId, CommunityFilter, PostFilter};

/// Keyed lookups used by scope builders to resolve trigger identifiers
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EntityLookup: Send + Sync {
    async fn find_message(&self, id: &str) -> Result<Option<MessageRecord>, DomainError>;

    async fn find_conversation(&self, id: &str) -> Result<Option<ConversationRecord>, DomainError>;

    async fn find_post(&self, id: &str) -> Result<Option<PostRecord>, DomainError>;

    async fn find_comment(&self, id: &str) -> Result<Option<CommentRecord>, DomainError>;

    /// Whether the user already belongs to the community
    async fn is_member(&self, user_id: &str, community_id: &str) -> Result<bool, DomainError>;
}

/// Filtered scans behind the data tools
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SocialDataSource: Send + Sync {
    /// Most recent messages of a conversation, newest last
    async fn messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, DomainError>;

    async fn posts(
        &self,
        filter: &PostFilter,
        limit: usize,
    ) -> Result<Vec<PostRecord>, DomainError>;

    /// Relationships between `observer_id` and `user_id`
    async fn relationships(
        &self,
        observer_id: &str,
        user_id: &str,
    ) -> Result<Vec<Relationship>, DomainError>;

    async fn communities(
        &self,
        filter: &CommunityFilter,
        limit: usize,
    ) -> Result<Vec<CommunityRecord>, DomainError>;

    /// Most important memories first
    async fn memories(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryRecord>, DomainError>;
}

/// Population of agents eligible for fan-out batches
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Agents currently allowed to act
    async fn eligible_agents(&self) -> Result<Vec<AgentId>, DomainError>;

    /// Whether the user id belongs to an agent
    async fn is_agent(&self, user_id: &str) -> Result<bool, DomainError>;
}
