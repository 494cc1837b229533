//! Scope-gated access to data and action tools

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::domain::workflow::{ActionTool, DataTool, RunErrorKind};
use crate::domain::{
    ActionId, DataDomain, DomainError, ScopeEnforcer, ScopeViolation, WorkflowScope,
};

/// Failure of a gated tool call
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Scope(#[from] ScopeViolation),

    #[error("No tool registered for {0}")]
    Missing(String),

    #[error(transparent)]
    Failed(DomainError),
}

impl ToolError {
    /// How the failure is recorded on the run
    pub fn run_error_kind(&self, loading: bool) -> RunErrorKind {
        match self {
            Self::Scope(_) => RunErrorKind::ScopeViolation,
            Self::Missing(_) => RunErrorKind::MissingTool,
            Self::Failed(_) if loading => RunErrorKind::DataLoad,
            Self::Failed(_) => RunErrorKind::Action,
        }
    }
}

/// Every tool call passes through here; the enforcer runs before the tool
#[derive(Debug, Default)]
pub struct ToolRegistry {
    enforcer: ScopeEnforcer,
    data_tools: HashMap<DataDomain, Arc<dyn DataTool>>,
    action_tools: HashMap<ActionId, Arc<dyn ActionTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data tool; replaces any tool for the same domain
    pub fn with_data_tool(mut self, tool: Arc<dyn DataTool>) -> Self {
        self.data_tools.insert(tool.domain(), tool);
        self
    }

    /// Register an action tool; replaces any tool for the same action
    pub fn with_action_tool(mut self, tool: Arc<dyn ActionTool>) -> Self {
        self.action_tools.insert(tool.action_id(), tool);
        self
    }

    pub fn enforcer(&self) -> &ScopeEnforcer {
        &self.enforcer
    }

    pub fn has_action(&self, action: &ActionId) -> bool {
        self.action_tools.contains_key(action)
    }

    /// Load `domain` with the query the scope declares for it
    pub async fn load(
        &self,
        scope: &WorkflowScope,
        domain: DataDomain,
    ) -> Result<Value, ToolError> {
        self.enforcer.ensure_access(scope, domain)?;

        let query = scope
            .data_scope()
            .get(domain)
            .ok_or_else(|| ToolError::Missing(format!("query for domain '{}'", domain)))?;

        let tool = self
            .data_tools
            .get(&domain)
            .ok_or_else(|| ToolError::Missing(format!("domain '{}'", domain)))?;

        tool.load(scope, query).await.map_err(ToolError::Failed)
    }

    pub async fn execute(
        &self,
        scope: &WorkflowScope,
        action: &ActionId,
        params: &Value,
    ) -> Result<Value, ToolError> {
        self.enforcer.ensure_perform(scope, action)?;

        let tool = self
            .action_tools
            .get(action)
            .ok_or_else(|| ToolError::Missing(format!("action '{}'", action)))?;

        tool.execute(scope, params).await.map_err(ToolError::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scope::{DomainQuery, PostFilter};
    use crate::domain::workflow::mock::{RecordingActionTool, StaticDataTool};
    use crate::domain::{Actor, Subject, SubjectKind, WorkflowKey, WorkflowTrigger};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn scope() -> WorkflowScope {
        WorkflowScope::builder(
            WorkflowTrigger::schedule(WorkflowKey::FeedEngagement),
            Actor::agent("a1"),
            Subject::new("a1", SubjectKind::User),
        )
        .query(DomainQuery::Posts {
            filter: PostFilter::RecentFeed,
            limit: 5,
        })
        .action(ActionId::LIKE)
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn test_out_of_scope_domain_never_reaches_tool() {
        let memories = StaticDataTool::new(DataDomain::Memories, json!([]));
        let loads = memories.load_counter();
        let registry = ToolRegistry::new().with_data_tool(Arc::new(memories));

        let err = registry.load(&scope(), DataDomain::Memories).await.unwrap_err();

        assert!(matches!(err, ToolError::Scope(_)));
        assert_eq!(err.run_error_kind(true), RunErrorKind::ScopeViolation);
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_out_of_scope_action_never_reaches_tool() {
        let follow = RecordingActionTool::new(ActionId::FOLLOW);
        let calls = follow.calls();
        let registry = ToolRegistry::new().with_action_tool(Arc::new(follow));

        let err = registry
            .execute(&scope(), &ActionId::new(ActionId::FOLLOW), &Value::Null)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Scope(_)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let registry = ToolRegistry::new();

        let err = registry.load(&scope(), DataDomain::Posts).await.unwrap_err();
        assert_eq!(err.run_error_kind(true), RunErrorKind::MissingTool);
    }

    #[tokio::test]
    async fn test_in_scope_calls_pass_through() {
        let registry = ToolRegistry::new()
            .with_data_tool(Arc::new(StaticDataTool::new(DataDomain::Posts, json!([{"id": "p1"}]))))
            .with_action_tool(Arc::new(RecordingActionTool::failing(ActionId::LIKE)));

        let posts = registry.load(&scope(), DataDomain::Posts).await.unwrap();
        assert_eq!(posts[0]["id"], "p1");

        let err = registry
            .execute(&scope(), &ActionId::new(ActionId::LIKE), &json!({"post_id": "p1"}))
            .await
            .unwrap_err();
        assert_eq!(err.run_error_kind(false), RunErrorKind::Action);
    }
}
