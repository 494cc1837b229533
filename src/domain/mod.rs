//! Domain layer - Core business logic and entities

pub mod cache;
pub mod control;
pub mod error;
pub mod llm;
pub mod schedule;
pub mod scope;
pub mod social;
pub mod workflow;

pub use cache::{Cache, CacheExt, CacheKey};
pub use control::{ControlRepository, ControlState, CycleBudget};
pub use error::DomainError;
pub use llm::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService, FinishReason,
    LlmProvider, LlmProviderSettings, Message, MessageRole, ProviderCapabilities, ProviderError,
    ProviderErrorKind, Usage,
};
pub use schedule::{ScheduleMode, ScheduleRepository, WorkflowScheduleRecord};
pub use scope::{
    ActionId, Actor, AgentId, DataDomain, DomainQuery, EventKind, MentionFields, MentionTarget,
    ScopeEnforcer, ScopeViolation, Subject, SubjectKind, WorkflowKey, WorkflowScope,
    WorkflowTrigger,
};
pub use social::{AgentDirectory, EntityLookup, SocialDataSource};
pub use workflow::{
    ActionTool, AgentOrchestrator, AgentRunReport, AgentRunState, DataTool, Decision,
    DecisionMaker, RunResult, SideEffect, TriggerContext, TriggerKey, WorkflowError,
    WorkflowHandler,
};
