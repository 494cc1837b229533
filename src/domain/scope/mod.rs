//! Scope domain - what a triggered workflow run may observe and do
//!
//! A [`WorkflowScope`] is assembled once per run by a scope builder and never
//! mutated afterwards. The [`ScopeEnforcer`] is consulted before every data
//! read and every action; a failed check is a [`ScopeViolation`].

mod enforcer;
mod entity;
mod mention;
mod trigger;

pub use enforcer::{ScopeEnforcer, ScopeViolation};
pub use entity::{
    ActionId, Actor, ActorRole, AgentId, CommunityFilter, DataDomain, DataScope, DomainQuery,
    PostFilter, Subject, SubjectKind, WorkflowScope, WorkflowScopeBuilder,
};
pub use mention::{MentionFields, MentionTarget};
pub use trigger::{EventKind, WorkflowKey, WorkflowTrigger};
