//! Workflow infrastructure: the run loop, its tools and the handlers around it

mod cached_tool;
mod data_tools;
pub mod handlers;
mod llm_decision;
mod orchestrator;
mod registry;
pub mod scope_builders;
mod side_effects;
mod tool_registry;

pub use cached_tool::CachedDataTool;
pub use data_tools::SocialDataTool;
pub use handlers::standard_handlers;
pub use llm_decision::LlmDecisionMaker;
pub use orchestrator::{PerceiveReasonActOrchestrator, RunLoopConfig};
pub use registry::WorkflowRegistry;
pub use scope_builders::{ScopeBuilders, ScopeLimits};
pub use side_effects::SideEffectDispatcher;
pub use tool_registry::{ToolError, ToolRegistry};
