//! Social entities as seen by the engine (read-only)

mod entity;
mod repository;

pub use entity::{
    CommentRecord, CommunityRecord, ConversationRecord, MemoryRecord, MessageRecord, PostRecord,
    Relationship, RelationshipKind,
};
pub use repository::{AgentDirectory, EntityLookup, SocialDataSource};

#[cfg(test)]
pub use repository::{MockAgentDirectory, MockEntityLookup, MockSocialDataSource};
