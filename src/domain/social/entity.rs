//! Read models of the social entities the engine observes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message in a direct or group conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A conversation and its participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub participant_ids: Vec<String>,
    pub is_group: bool,
}

impl ConversationRecord {
    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participant_ids.iter().any(|p| p == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub community_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Following,
    FollowedBy,
    Mutual,
    Rival,
}

/// How the observing agent relates to another user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub user_id: String,
    pub other_id: String,
    pub kind: RelationshipKind,
    /// -1.0 (hostile) .. 1.0 (close)
    pub affinity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub member_count: u32,
}

/// Something an agent remembers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub importance: f32,
    pub created_at: DateTime<Utc>,
}
