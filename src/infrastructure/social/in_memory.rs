//! In-memory social store

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::scope::{CommunityFilter, PostFilter};
use crate::domain::social::{
    CommentRecord, CommunityRecord, ConversationRecord, MemoryRecord, MessageRecord, PostRecord,
    Relationship,
};
use crate::domain::{ActionId, AgentDirectory, AgentId, DomainError, EntityLookup, SocialDataSource};

/// Seed data for the in-memory store, usually read from a JSON file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SocialFixture {
    pub agents: Vec<String>,
    pub conversations: Vec<ConversationRecord>,
    pub messages: Vec<MessageRecord>,
    pub posts: Vec<PostRecord>,
    pub comments: Vec<CommentRecord>,
    pub relationships: Vec<Relationship>,
    pub communities: Vec<CommunityRecord>,
    /// `(user_id, community_id)` pairs
    pub memberships: Vec<(String, String)>,
    pub memories: Vec<MemoryRecord>,
}

/// An action applied to the store by an action tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformedAction {
    pub agent_id: String,
    pub action: ActionId,
    pub subject_id: String,
    pub params: Value,
    pub performed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub actor_id: String,
    pub action: ActionId,
    pub subject_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SocialState {
    /// Agent id to "allowed to act"
    agents: BTreeMap<String, bool>,
    conversations: HashMap<String, ConversationRecord>,
    messages: Vec<MessageRecord>,
    posts: Vec<PostRecord>,
    comments: Vec<CommentRecord>,
    relationships: Vec<Relationship>,
    communities: BTreeMap<String, CommunityRecord>,
    memberships: HashSet<(String, String)>,
    memories: Vec<MemoryRecord>,
    likes: HashSet<(String, String)>,
    follows: HashSet<(String, String)>,
    experience: HashMap<String, u64>,
    notifications: Vec<Notification>,
    journal: Vec<PerformedAction>,
}

/// Social graph held in process memory.
///
/// Serves the read ports used by scope builders, data tools and batches, and
/// records the writes made by [`super::StoreActionTool`] and the side effects.
#[derive(Debug, Default)]
pub struct InMemorySocialStore {
    state: RwLock<SocialState>,
}

impl InMemorySocialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: SocialFixture) -> Self {
        let state = SocialState {
            agents: fixture.agents.into_iter().map(|id| (id, true)).collect(),
            conversations: fixture
                .conversations
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            messages: fixture.messages,
            posts: fixture.posts,
            comments: fixture.comments,
            relationships: fixture.relationships,
            communities: fixture
                .communities
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            memberships: fixture.memberships.into_iter().collect(),
            memories: fixture.memories,
            ..SocialState::default()
        };

        Self {
            state: RwLock::new(state),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SocialState>, DomainError> {
        self.state
            .read()
            .map_err(|_| DomainError::storage("Social store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SocialState>, DomainError> {
        self.state
            .write()
            .map_err(|_| DomainError::storage("Social store lock poisoned"))
    }

    pub fn add_agent(&self, id: impl Into<String>) -> Result<(), DomainError> {
        self.write()?.agents.insert(id.into(), true);
        Ok(())
    }

    pub fn set_agent_active(&self, id: &str, active: bool) -> Result<(), DomainError> {
        let mut state = self.write()?;
        let entry = state
            .agents
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found(format!("Agent '{}' not found", id)))?;
        *entry = active;
        Ok(())
    }

    pub fn add_conversation(&self, conversation: ConversationRecord) -> Result<(), DomainError> {
        self.write()?
            .conversations
            .insert(conversation.id.clone(), conversation);
        Ok(())
    }

    pub fn add_message(&self, message: MessageRecord) -> Result<(), DomainError> {
        self.write()?.messages.push(message);
        Ok(())
    }

    pub fn add_post(&self, post: PostRecord) -> Result<(), DomainError> {
        self.write()?.posts.push(post);
        Ok(())
    }

    pub fn add_comment(&self, comment: CommentRecord) -> Result<(), DomainError> {
        self.write()?.comments.push(comment);
        Ok(())
    }

    pub fn add_relationship(&self, relationship: Relationship) -> Result<(), DomainError> {
        self.write()?.relationships.push(relationship);
        Ok(())
    }

    pub fn add_community(&self, community: CommunityRecord) -> Result<(), DomainError> {
        self.write()?
            .communities
            .insert(community.id.clone(), community);
        Ok(())
    }

    /// Add a membership; `false` if the user was already a member
    pub fn join_community(&self, user_id: &str, community_id: &str) -> Result<bool, DomainError> {
        let mut state = self.write()?;
        if !state.communities.contains_key(community_id) {
            return Err(DomainError::not_found(format!(
                "Community '{}' not found",
                community_id
            )));
        }

        let joined = state
            .memberships
            .insert((user_id.to_string(), community_id.to_string()));
        if joined {
            if let Some(community) = state.communities.get_mut(community_id) {
                community.member_count += 1;
            }
        }
        Ok(joined)
    }

    pub fn add_memory(&self, memory: MemoryRecord) -> Result<(), DomainError> {
        self.write()?.memories.push(memory);
        Ok(())
    }

    /// `false` if the like already existed
    pub fn like(&self, user_id: &str, target_id: &str) -> Result<bool, DomainError> {
        Ok(self
            .write()?
            .likes
            .insert((user_id.to_string(), target_id.to_string())))
    }

    /// `false` if the follow already existed
    pub fn follow(&self, follower_id: &str, followed_id: &str) -> Result<bool, DomainError> {
        if follower_id == followed_id {
            return Err(DomainError::validation("Users cannot follow themselves"));
        }
        Ok(self
            .write()?
            .follows
            .insert((follower_id.to_string(), followed_id.to_string())))
    }

    pub fn is_following(&self, follower_id: &str, followed_id: &str) -> Result<bool, DomainError> {
        Ok(self
            .read()?
            .follows
            .contains(&(follower_id.to_string(), followed_id.to_string())))
    }

    pub fn award_experience(&self, user_id: &str, points: u64) -> Result<u64, DomainError> {
        let mut state = self.write()?;
        let total = state.experience.entry(user_id.to_string()).or_insert(0);
        *total += points;
        Ok(*total)
    }

    pub fn experience(&self, user_id: &str) -> Result<u64, DomainError> {
        Ok(self.read()?.experience.get(user_id).copied().unwrap_or(0))
    }

    pub fn notify(&self, notification: Notification) -> Result<(), DomainError> {
        self.write()?.notifications.push(notification);
        Ok(())
    }

    pub fn notifications(&self) -> Result<Vec<Notification>, DomainError> {
        Ok(self.read()?.notifications.clone())
    }

    pub fn record_action(&self, action: PerformedAction) -> Result<(), DomainError> {
        self.write()?.journal.push(action);
        Ok(())
    }

    /// Every action applied so far, oldest first
    pub fn performed_actions(&self) -> Result<Vec<PerformedAction>, DomainError> {
        Ok(self.read()?.journal.clone())
    }

    pub fn comments_on(&self, post_id: &str) -> Result<Vec<CommentRecord>, DomainError> {
        Ok(self
            .read()?
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }
}

fn newest_first<T: Clone>(items: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut sorted = items.to_vec();
    sorted.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    sorted
}

#[async_trait]
impl EntityLookup for InMemorySocialStore {
    async fn find_message(&self, id: &str) -> Result<Option<MessageRecord>, DomainError> {
        Ok(self.read()?.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn find_conversation(&self, id: &str) -> Result<Option<ConversationRecord>, DomainError> {
        Ok(self.read()?.conversations.get(id).cloned())
    }

    async fn find_post(&self, id: &str) -> Result<Option<PostRecord>, DomainError> {
        Ok(self.read()?.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn find_comment(&self, id: &str) -> Result<Option<CommentRecord>, DomainError> {
        Ok(self.read()?.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn is_member(&self, user_id: &str, community_id: &str) -> Result<bool, DomainError> {
        Ok(self
            .read()?
            .memberships
            .contains(&(user_id.to_string(), community_id.to_string())))
    }
}

#[async_trait]
impl SocialDataSource for InMemorySocialStore {
    async fn messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<MessageRecord>, DomainError> {
        let state = self.read()?;
        let mut messages: Vec<MessageRecord> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);

        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }

    async fn posts(
        &self,
        filter: &PostFilter,
        limit: usize,
    ) -> Result<Vec<PostRecord>, DomainError> {
        let state = self.read()?;
        let matching: Vec<PostRecord> = state
            .posts
            .iter()
            .filter(|post| match filter {
                PostFilter::ById { post_id } => &post.id == post_id,
                PostFilter::ByAuthor { author_id } => &post.author_id == author_id,
                PostFilter::ByCommunity { community_id } => {
                    post.community_id.as_ref() == Some(community_id)
                }
                PostFilter::RecentFeed => true,
            })
            .cloned()
            .collect();

        Ok(newest_first(&matching, |p| p.created_at)
            .into_iter()
            .take(limit)
            .collect())
    }

    async fn relationships(
        &self,
        observer_id: &str,
        user_id: &str,
    ) -> Result<Vec<Relationship>, DomainError> {
        Ok(self
            .read()?
            .relationships
            .iter()
            .filter(|r| r.user_id == observer_id && r.other_id == user_id)
            .cloned()
            .collect())
    }

    async fn communities(
        &self,
        filter: &CommunityFilter,
        limit: usize,
    ) -> Result<Vec<CommunityRecord>, DomainError> {
        let state = self.read()?;
        let mut communities: Vec<CommunityRecord> = match filter {
            CommunityFilter::JoinedBy { user_id } => state
                .communities
                .values()
                .filter(|c| state.memberships.contains(&(user_id.clone(), c.id.clone())))
                .cloned()
                .collect(),
            CommunityFilter::ById { community_id } => {
                state.communities.get(community_id).cloned().into_iter().collect()
            }
            CommunityFilter::Suggested => {
                let mut all: Vec<CommunityRecord> = state.communities.values().cloned().collect();
                all.sort_by(|a, b| b.member_count.cmp(&a.member_count));
                all
            }
        };
        communities.truncate(limit);
        Ok(communities)
    }

    async fn memories(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRecord>, DomainError> {
        let mut memories: Vec<MemoryRecord> = self
            .read()?
            .memories
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        memories.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        memories.truncate(limit);
        Ok(memories)
    }
}

#[async_trait]
impl AgentDirectory for InMemorySocialStore {
    async fn eligible_agents(&self) -> Result<Vec<AgentId>, DomainError> {
        Ok(self
            .read()?
            .agents
            .iter()
            .filter(|(_, active)| **active)
            .map(|(id, _)| AgentId::new(id.clone()))
            .collect())
    }

    async fn is_agent(&self, user_id: &str) -> Result<bool, DomainError> {
        Ok(self.read()?.agents.contains_key(user_id))
    }
}
