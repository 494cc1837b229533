//! Scope enforcer - gate checked before every data read and action

use thiserror::Error;

use super::{ActionId, DataDomain, WorkflowScope};

/// Attempted access outside the declared scope. Always fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeViolation {
    #[error("Domain '{domain}' is not in scope for agent '{agent_id}' ({trigger})")]
    Domain {
        domain: DataDomain,
        agent_id: String,
        trigger: String,
    },

    #[error("Action '{action}' is not permitted for agent '{agent_id}' ({trigger})")]
    Action {
        action: ActionId,
        agent_id: String,
        trigger: String,
    },
}

/// Stateless scope checks
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeEnforcer;

impl ScopeEnforcer {
    pub fn new() -> Self {
        Self
    }

    pub fn can_access(&self, scope: &WorkflowScope, domain: DataDomain) -> bool {
        scope.data_scope().contains(domain)
    }

    /// NOOP never reaches a tool, so it is not "performable"
    pub fn can_perform(&self, scope: &WorkflowScope, action: &ActionId) -> bool {
        !action.is_noop() && scope.available_actions().contains(action)
    }

    pub fn ensure_access(
        &self,
        scope: &WorkflowScope,
        domain: DataDomain,
    ) -> Result<(), ScopeViolation> {
        if self.can_access(scope, domain) {
            return Ok(());
        }

        Err(ScopeViolation::Domain {
            domain,
            agent_id: scope.actor().id.to_string(),
            trigger: scope.trigger().label(),
        })
    }

    pub fn ensure_perform(
        &self,
        scope: &WorkflowScope,
        action: &ActionId,
    ) -> Result<(), ScopeViolation> {
        if self.can_perform(scope, action) {
            return Ok(());
        }

        Err(ScopeViolation::Action {
            action: action.clone(),
            agent_id: scope.actor().id.to_string(),
            trigger: scope.trigger().label(),
        })
    }
}
