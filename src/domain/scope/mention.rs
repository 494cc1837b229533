//! Mention targets - where an agent was mentioned

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Optional context fields as they arrive on a mention event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionFields {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub group_conversation_id: Option<String>,
}

/// Where the mention happened. Exactly one variant applies per event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MentionTarget {
    Post { post_id: String },
    Comment { post_id: String, comment_id: String },
    DirectMessage { conversation_id: String },
    GroupMessage { group_conversation_id: String },
}

impl MentionTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post { .. } => "post_mention",
            Self::Comment { .. } => "comment_mention",
            Self::DirectMessage { .. } => "direct_message_mention",
            Self::GroupMessage { .. } => "group_message_mention",
        }
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl TryFrom<&MentionFields> for MentionTarget {
    type Error = DomainError;

    fn try_from(fields: &MentionFields) -> Result<Self, Self::Error> {
        let post = present(&fields.post_id);
        let comment = present(&fields.comment_id);
        let conversation = present(&fields.conversation_id);
        let group = present(&fields.group_conversation_id);

        if comment.is_some() && post.is_none() {
            return Err(DomainError::configuration(
                "Mention has a comment id without its post id",
            ));
        }

        let candidates = [post.is_some(), conversation.is_some(), group.is_some()]
            .iter()
            .filter(|set| **set)
            .count();

        if candidates > 1 {
            return Err(DomainError::configuration(format!(
                "Mention context is ambiguous: {} targets set",
                candidates
            )));
        }

        match (post, comment, conversation, group) {
            (Some(post_id), Some(comment_id), _, _) => Ok(Self::Comment {
                post_id: post_id.to_string(),
                comment_id: comment_id.to_string(),
            }),
            (Some(post_id), None, _, _) => Ok(Self::Post {
                post_id: post_id.to_string(),
            }),
            (None, _, Some(conversation_id), _) => Ok(Self::DirectMessage {
                conversation_id: conversation_id.to_string(),
            }),
            (None, _, None, Some(group_conversation_id)) => Ok(Self::GroupMessage {
                group_conversation_id: group_conversation_id.to_string(),
            }),
            (None, _, None, None) => Err(DomainError::configuration(
                "Mention has no post, conversation or group conversation context",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(
        post: Option<&str>,
        comment: Option<&str>,
        dm: Option<&str>,
        group: Option<&str>,
    ) -> MentionFields {
        MentionFields {
            post_id: post.map(String::from),
            comment_id: comment.map(String::from),
            conversation_id: dm.map(String::from),
            group_conversation_id: group.map(String::from),
        }
    }

    #[test]
    fn test_each_branch_resolves() {
        assert_eq!(
            MentionTarget::try_from(&fields(Some("p1"), None, None, None)).unwrap(),
            MentionTarget::Post { post_id: "p1".into() }
        );
        assert_eq!(
            MentionTarget::try_from(&fields(Some("p1"), Some("c9"), None, None)).unwrap(),
            MentionTarget::Comment {
                post_id: "p1".into(),
                comment_id: "c9".into()
            }
        );
        assert_eq!(
            MentionTarget::try_from(&fields(None, None, Some("dm1"), None)).unwrap(),
            MentionTarget::DirectMessage {
                conversation_id: "dm1".into()
            }
        );
        assert_eq!(
            MentionTarget::try_from(&fields(None, None, None, Some("g1"))).unwrap(),
            MentionTarget::GroupMessage {
                group_conversation_id: "g1".into()
            }
        );
    }

    #[test]
    fn test_no_context_rejected() {
        let err = MentionTarget::try_from(&fields(None, None, None, None)).unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_blank_fields_count_as_absent() {
        let result = MentionTarget::try_from(&fields(Some("  "), None, Some("dm1"), None));
        assert!(matches!(result, Ok(MentionTarget::DirectMessage { .. })));
    }

    #[test]
    fn test_ambiguous_context_rejected() {
        assert!(MentionTarget::try_from(&fields(Some("p1"), None, Some("dm1"), None)).is_err());
        assert!(MentionTarget::try_from(&fields(None, None, Some("dm1"), Some("g1"))).is_err());
    }

    #[test]
    fn test_orphan_comment_rejected() {
        assert!(MentionTarget::try_from(&fields(None, Some("c1"), None, None)).is_err());
    }
}
