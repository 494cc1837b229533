//! Data tools reading the social store

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::workflow::DataTool;
use crate::domain::{DataDomain, DomainError, DomainQuery, SocialDataSource, WorkflowScope};

/// One data tool per domain over a shared [`SocialDataSource`]
#[derive(Clone)]
pub struct SocialDataTool {
    source: Arc<dyn SocialDataSource>,
    domain: DataDomain,
}

impl std::fmt::Debug for SocialDataTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocialDataTool")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl SocialDataTool {
    pub fn new(source: Arc<dyn SocialDataSource>, domain: DataDomain) -> Self {
        Self { source, domain }
    }

    /// A tool for every domain
    pub fn all(source: Arc<dyn SocialDataSource>) -> Vec<Self> {
        DataDomain::ALL
            .into_iter()
            .map(|domain| Self::new(source.clone(), domain))
            .collect()
    }
}

fn to_value<T: Serialize>(records: T) -> Result<Value, DomainError> {
    serde_json::to_value(records)
        .map_err(|e| DomainError::internal(format!("Failed to serialize records: {}", e)))
}

#[async_trait]
impl DataTool for SocialDataTool {
    fn domain(&self) -> DataDomain {
        self.domain
    }

    async fn load(&self, scope: &WorkflowScope, query: &DomainQuery) -> Result<Value, DomainError> {
        if query.domain() != self.domain {
            return Err(DomainError::validation(format!(
                "Query for '{}' sent to the '{}' tool",
                query.domain(),
                self.domain
            )));
        }

        match query {
            DomainQuery::Messages {
                conversation_id,
                limit,
            } => to_value(self.source.messages(conversation_id, *limit).await?),
            DomainQuery::Posts { filter, limit } => {
                to_value(self.source.posts(filter, *limit).await?)
            }
            DomainQuery::Relationships { user_id } => {
                let observer = scope.actor().id.as_str();
                to_value(self.source.relationships(observer, user_id).await?)
            }
            DomainQuery::Communities { filter, limit } => {
                to_value(self.source.communities(filter, *limit).await?)
            }
            DomainQuery::Memories { user_id, limit } => {
                to_value(self.source.memories(user_id, *limit).await?)
            }
        }
    }
}
