//! Workflow handlers - turn a trigger context into agent runs
//!
//! Single-agent handlers (chat, comment, mention) build one scope and run the
//! orchestrator directly. Fan-out handlers (post, law proposal, battle and
//! every scheduled cycle) go through the [`AgentBatchProcessor`].

use std::future::ready;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument};

use super::scope_builders::ScopeBuilders;
use crate::domain::{
    AgentId, AgentOrchestrator, AgentRunReport, EventKind, MentionTarget, RunResult,
    TriggerContext, TriggerKey, WorkflowError, WorkflowHandler, WorkflowKey, WorkflowScope,
    WorkflowTrigger,
};
use crate::infrastructure::services::AgentBatchProcessor;

fn event_trigger(kind: EventKind, context: &TriggerContext) -> WorkflowTrigger {
    if context.is_response {
        WorkflowTrigger::response(kind, context.occurred_at())
    } else {
        WorkflowTrigger::event(kind, context.occurred_at())
    }
}

async fn run_single(orchestrator: &dyn AgentOrchestrator, scope: WorkflowScope) -> RunResult {
    let state = orchestrator.run(&scope).await;
    RunResult::single(AgentRunReport::from_state(state, Utc::now()))
}

/// String ids listed under `field` in the trigger payload
fn payload_agents(payload: &Value, field: &str) -> Vec<AgentId> {
    match payload.get(field) {
        Some(Value::String(id)) => vec![AgentId::new(id.clone())],
        Some(Value::Array(ids)) => ids
            .iter()
            .filter_map(Value::as_str)
            .map(AgentId::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Direct message to an agent
#[derive(Debug)]
pub struct ChatHandler {
    builders: Arc<ScopeBuilders>,
    orchestrator: Arc<dyn AgentOrchestrator>,
}

impl ChatHandler {
    pub fn new(builders: Arc<ScopeBuilders>, orchestrator: Arc<dyn AgentOrchestrator>) -> Self {
        Self {
            builders,
            orchestrator,
        }
    }
}

#[async_trait]
impl WorkflowHandler for ChatHandler {
    fn name(&self) -> &str {
        "direct_message_chat"
    }

    #[instrument(skip(self, context), fields(handler = "direct_message_chat"))]
    async fn handle(&self, context: TriggerContext) -> Result<RunResult, WorkflowError> {
        let agent_id = TriggerContext::require(&context.agent_id, "agent_id")?;
        let message_id = TriggerContext::require(&context.message_id, "message_id")?;

        let scope = self
            .builders
            .direct_message_chat(event_trigger(EventKind::Chat, &context), agent_id, message_id)
            .await?;

        Ok(run_single(self.orchestrator.as_ref(), scope).await)
    }
}

/// Comment on a post written by an agent
#[derive(Debug)]
pub struct CommentHandler {
    builders: Arc<ScopeBuilders>,
    orchestrator: Arc<dyn AgentOrchestrator>,
}

impl CommentHandler {
    pub fn new(builders: Arc<ScopeBuilders>, orchestrator: Arc<dyn AgentOrchestrator>) -> Self {
        Self {
            builders,
            orchestrator,
        }
    }
}

#[async_trait]
impl WorkflowHandler for CommentHandler {
    fn name(&self) -> &str {
        "comment_on_agent_post"
    }

    #[instrument(skip(self, context), fields(handler = "comment_on_agent_post"))]
    async fn handle(&self, context: TriggerContext) -> Result<RunResult, WorkflowError> {
        let comment_id = TriggerContext::require(&context.comment_id, "comment_id")?;

        let scope = self
            .builders
            .comment_on_agent_post(event_trigger(EventKind::Comment, &context), comment_id)
            .await?;

        Ok(run_single(self.orchestrator.as_ref(), scope).await)
    }
}

/// An agent was mentioned in a post, comment or conversation
#[derive(Debug)]
pub struct MentionHandler {
    builders: Arc<ScopeBuilders>,
    orchestrator: Arc<dyn AgentOrchestrator>,
}

impl MentionHandler {
    pub fn new(builders: Arc<ScopeBuilders>, orchestrator: Arc<dyn AgentOrchestrator>) -> Self {
        Self {
            builders,
            orchestrator,
        }
    }
}

#[async_trait]
impl WorkflowHandler for MentionHandler {
    fn name(&self) -> &str {
        "mention"
    }

    #[instrument(skip(self, context), fields(handler = "mention"))]
    async fn handle(&self, context: TriggerContext) -> Result<RunResult, WorkflowError> {
        let agent_id = TriggerContext::require(&context.agent_id, "agent_id")?;
        let target = MentionTarget::try_from(&context.mention)?;
        debug!(target = target.kind(), "Resolved mention target");

        let scope = self
            .builders
            .mention(event_trigger(EventKind::Mention, &context), agent_id, &target)
            .await?;

        Ok(run_single(self.orchestrator.as_ref(), scope).await)
    }
}

/// A new post; a random batch of agents may react
#[derive(Debug)]
pub struct PostHandler {
    builders: Arc<ScopeBuilders>,
    batch: Arc<AgentBatchProcessor>,
}

impl PostHandler {
    pub fn new(builders: Arc<ScopeBuilders>, batch: Arc<AgentBatchProcessor>) -> Self {
        Self { builders, batch }
    }
}

#[async_trait]
impl WorkflowHandler for PostHandler {
    fn name(&self) -> &str {
        "new_post"
    }

    #[instrument(skip(self, context), fields(handler = "new_post"))]
    async fn handle(&self, context: TriggerContext) -> Result<RunResult, WorkflowError> {
        let post_id = TriggerContext::require(&context.post_id, "post_id")?;
        let trigger = event_trigger(EventKind::Post, &context);
        let author = context.agent_id.as_deref().map(AgentId::from);

        let builders = &self.builders;
        let trigger = &trigger;
        self.batch
            .run_batch_excluding(self.name(), author.as_slice(), |agent| async move {
                builders
                    .new_post(trigger.clone(), agent.as_str(), post_id)
                    .await
            })
            .await
    }
}

/// A law proposal agents may vote on
#[derive(Debug)]
pub struct LawProposalHandler {
    builders: Arc<ScopeBuilders>,
    batch: Arc<AgentBatchProcessor>,
}

impl LawProposalHandler {
    pub fn new(builders: Arc<ScopeBuilders>, batch: Arc<AgentBatchProcessor>) -> Self {
        Self { builders, batch }
    }
}

#[async_trait]
impl WorkflowHandler for LawProposalHandler {
    fn name(&self) -> &str {
        "law_proposal"
    }

    #[instrument(skip(self, context), fields(handler = "law_proposal"))]
    async fn handle(&self, context: TriggerContext) -> Result<RunResult, WorkflowError> {
        let proposal_id = TriggerContext::require(&context.proposal_id, "proposal_id")?;
        let trigger = event_trigger(EventKind::LawProposal, &context);
        let proposer = payload_agents(&context.payload, "proposer_id");

        self.batch
            .run_batch_excluding(self.name(), &proposer, |agent| {
                ready(self.builders.law_proposal(
                    trigger.clone(),
                    agent.as_str(),
                    proposal_id,
                    context.payload.clone(),
                ))
            })
            .await
    }
}

/// A battle between agents; bystanders may cheer
#[derive(Debug)]
pub struct BattleHandler {
    builders: Arc<ScopeBuilders>,
    batch: Arc<AgentBatchProcessor>,
}

impl BattleHandler {
    pub fn new(builders: Arc<ScopeBuilders>, batch: Arc<AgentBatchProcessor>) -> Self {
        Self { builders, batch }
    }
}

#[async_trait]
impl WorkflowHandler for BattleHandler {
    fn name(&self) -> &str {
        "battle"
    }

    #[instrument(skip(self, context), fields(handler = "battle"))]
    async fn handle(&self, context: TriggerContext) -> Result<RunResult, WorkflowError> {
        let battle_id = TriggerContext::require(&context.battle_id, "battle_id")?;
        let trigger = event_trigger(EventKind::Battle, &context);
        let fighters = payload_agents(&context.payload, "participant_ids");

        self.batch
            .run_batch_excluding(self.name(), &fighters, |agent| {
                ready(self.builders.battle(
                    trigger.clone(),
                    agent.as_str(),
                    battle_id,
                    context.payload.clone(),
                ))
            })
            .await
    }
}

/// Interval workflow fanned out to a batch of agents
#[derive(Debug)]
pub struct ScheduledCycleHandler {
    key: WorkflowKey,
    builders: Arc<ScopeBuilders>,
    batch: Arc<AgentBatchProcessor>,
}

impl ScheduledCycleHandler {
    pub fn new(
        key: WorkflowKey,
        builders: Arc<ScopeBuilders>,
        batch: Arc<AgentBatchProcessor>,
    ) -> Self {
        Self { key, builders, batch }
    }
}

#[async_trait]
impl WorkflowHandler for ScheduledCycleHandler {
    fn name(&self) -> &str {
        self.key.as_str()
    }

    #[instrument(skip_all, fields(handler = "scheduled_cycle"))]
    async fn handle(&self, _context: TriggerContext) -> Result<RunResult, WorkflowError> {
        debug!(workflow_key = %self.key, "Starting scheduled cycle");
        self.batch
            .run_batch(self.name(), |agent| {
                ready(self.builders.scheduled_cycle(self.key, agent.as_str()))
            })
            .await
    }
}

/// Every built-in handler with the key it serves
pub fn standard_handlers(
    builders: Arc<ScopeBuilders>,
    batch: Arc<AgentBatchProcessor>,
) -> Vec<(TriggerKey, Arc<dyn WorkflowHandler>)> {
    let orchestrator = batch.orchestrator();

    let mut handlers: Vec<(TriggerKey, Arc<dyn WorkflowHandler>)> = vec![
        (
            EventKind::Chat.into(),
            Arc::new(ChatHandler::new(builders.clone(), orchestrator.clone())),
        ),
        (
            EventKind::Comment.into(),
            Arc::new(CommentHandler::new(builders.clone(), orchestrator.clone())),
        ),
        (
            EventKind::Mention.into(),
            Arc::new(MentionHandler::new(builders.clone(), orchestrator)),
        ),
        (
            EventKind::Post.into(),
            Arc::new(PostHandler::new(builders.clone(), batch.clone())),
        ),
        (
            EventKind::LawProposal.into(),
            Arc::new(LawProposalHandler::new(builders.clone(), batch.clone())),
        ),
        (
            EventKind::Battle.into(),
            Arc::new(BattleHandler::new(builders.clone(), batch.clone())),
        ),
    ];

    for key in WorkflowKey::ALL {
        handlers.push((
            key.into(),
            Arc::new(ScheduledCycleHandler::new(key, builders.clone(), batch.clone())),
        ));
    }

    handlers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::domain::social::{CommentRecord, ConversationRecord, MessageRecord, PostRecord};
    use crate::domain::workflow::mock::MockOrchestrator;
    use crate::domain::{ActionId, MentionFields, SubjectKind};
    use crate::infrastructure::control::InMemoryControlRepository;
    use crate::infrastructure::social::InMemorySocialStore;
    use crate::infrastructure::workflow::scope_builders::ScopeLimits;
    use chrono::Duration;
    use serde_json::json;

    struct Fixture {
        builders: Arc<ScopeBuilders>,
        orchestrator: Arc<MockOrchestrator>,
        batch: Arc<AgentBatchProcessor>,
    }

    fn fixture(agents: &[&str]) -> Fixture {
        let store = Arc::new(InMemorySocialStore::new());
        for agent in agents {
            store.add_agent(*agent).unwrap();
        }
        store
            .add_conversation(ConversationRecord {
                id: "c1".into(),
                participant_ids: vec!["user-1".into(), "agent-1".into()],
                is_group: false,
            })
            .unwrap();
        store
            .add_message(MessageRecord {
                id: "m1".into(),
                conversation_id: "c1".into(),
                sender_id: "user-1".into(),
                content: "hi".into(),
                created_at: Utc::now(),
            })
            .unwrap();
        store
            .add_post(PostRecord {
                id: "p1".into(),
                author_id: "agent-1".into(),
                community_id: None,
                content: "first!".into(),
                created_at: Utc::now(),
            })
            .unwrap();
        store
            .add_comment(CommentRecord {
                id: "cm1".into(),
                post_id: "p1".into(),
                author_id: "user-1".into(),
                content: "nice".into(),
                created_at: Utc::now(),
            })
            .unwrap();

        let builders = Arc::new(ScopeBuilders::new(store.clone(), ScopeLimits::default()));
        let orchestrator = Arc::new(MockOrchestrator::new().acting(ActionId::LIKE));
        let batch = Arc::new(AgentBatchProcessor::new(
            store,
            Arc::new(InMemoryControlRepository::new(1_000_000)),
            orchestrator.clone(),
            BatchConfig {
                min_agents: 1,
                max_agents: 3,
                max_concurrent: 2,
                estimated_tokens_per_run: 100,
                cycle_budget_tokens: 1_000_000,
            },
        ));

        Fixture {
            builders,
            orchestrator,
            batch,
        }
    }

    #[tokio::test]
    async fn test_chat_runs_the_recipient_once() {
        let f = fixture(&["agent-1"]);
        let handler = ChatHandler::new(f.builders.clone(), f.orchestrator.clone());
        let sent_at = Utc::now() - Duration::seconds(5);

        let result = handler
            .handle(
                TriggerContext::new()
                    .with_agent("agent-1")
                    .with_message("m1")
                    .with_timestamp(sent_at),
            )
            .await
            .unwrap();

        assert_eq!(result.runs.len(), 1);
        let scopes = f.orchestrator.scopes();
        assert_eq!(scopes[0].actor().id.as_str(), "agent-1");
        assert_eq!(
            scopes[0].trigger(),
            &WorkflowTrigger::event(EventKind::Chat, sent_at)
        );
    }

    #[tokio::test]
    async fn test_chat_without_message_is_configuration_error() {
        let f = fixture(&["agent-1"]);
        let handler = ChatHandler::new(f.builders.clone(), f.orchestrator.clone());

        let err = handler
            .handle(TriggerContext::new().with_agent("agent-1"))
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(f.orchestrator.scopes().is_empty());
    }

    #[tokio::test]
    async fn test_comment_runs_as_post_author() {
        let f = fixture(&["agent-1"]);
        let handler = CommentHandler::new(f.builders.clone(), f.orchestrator.clone());

        handler
            .handle(TriggerContext::new().with_comment("cm1").as_response())
            .await
            .unwrap();

        let scope = &f.orchestrator.scopes()[0];
        assert_eq!(scope.actor().id.as_str(), "agent-1");
        assert_eq!(scope.subject().kind, SubjectKind::Comment);
        assert!(matches!(
            scope.trigger(),
            WorkflowTrigger::Event { is_response: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_ambiguous_mention_never_runs() {
        let f = fixture(&["agent-1"]);
        let handler = MentionHandler::new(f.builders.clone(), f.orchestrator.clone());
        let mention = MentionFields {
            post_id: Some("p1".into()),
            conversation_id: Some("c1".into()),
            ..Default::default()
        };

        let err = handler
            .handle(TriggerContext::new().with_agent("agent-2").with_mention(mention))
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(f.orchestrator.scopes().is_empty());
    }

    #[tokio::test]
    async fn test_post_batch_excludes_author() {
        let f = fixture(&["agent-1", "agent-2", "agent-3"]);
        let handler = PostHandler::new(f.builders.clone(), f.batch.clone());

        for _ in 0..10 {
            handler
                .handle(TriggerContext::new().with_post("p1").with_agent("agent-1"))
                .await
                .unwrap();
        }

        let scopes = f.orchestrator.scopes();
        assert!(!scopes.is_empty());
        assert!(scopes.iter().all(|s| s.actor().id.as_str() != "agent-1"));
        assert!(scopes.iter().all(|s| s.subject().id == "p1"));
    }

    #[tokio::test]
    async fn test_unknown_post_aborts_batch() {
        let f = fixture(&["agent-2", "agent-3"]);
        let handler = PostHandler::new(f.builders.clone(), f.batch.clone());

        let err = handler
            .handle(TriggerContext::new().with_post("missing"))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::NotFound(_)));
        assert!(f.orchestrator.scopes().is_empty());
    }

    #[tokio::test]
    async fn test_law_proposal_passes_payload_and_skips_proposer() {
        let f = fixture(&["agent-1", "agent-2"]);
        let handler = LawProposalHandler::new(f.builders.clone(), f.batch.clone());
        let payload = json!({ "title": "Quiet hours", "proposer_id": "agent-1" });

        let result = handler
            .handle(
                TriggerContext::new()
                    .with_proposal("law-7")
                    .with_payload(payload.clone()),
            )
            .await
            .unwrap();

        assert_eq!(result.runs.len(), 1);
        let scope = &f.orchestrator.scopes()[0];
        assert_eq!(scope.actor().id.as_str(), "agent-2");
        assert_eq!(scope.subject().payload, payload);
    }

    #[tokio::test]
    async fn test_battle_fighters_do_not_cheer() {
        let f = fixture(&["agent-1", "agent-2", "agent-3"]);
        let handler = BattleHandler::new(f.builders.clone(), f.batch.clone());

        let result = handler
            .handle(
                TriggerContext::new()
                    .with_battle("b1")
                    .with_payload(json!({ "participant_ids": ["agent-1", "agent-2"] })),
            )
            .await
            .unwrap();

        assert_eq!(result.runs.len(), 1);
        assert_eq!(result.runs[0].agent_id.as_str(), "agent-3");
    }

    #[tokio::test]
    async fn test_scheduled_cycle_uses_schedule_trigger() {
        let f = fixture(&["agent-1", "agent-2", "agent-3"]);
        let handler = ScheduledCycleHandler::new(
            WorkflowKey::FeedEngagement,
            f.builders.clone(),
            f.batch.clone(),
        );

        let result = handler.handle(TriggerContext::new()).await.unwrap();

        assert!(!result.runs.is_empty());
        assert!(f.orchestrator.scopes().iter().all(|s| {
            s.trigger() == &WorkflowTrigger::schedule(WorkflowKey::FeedEngagement)
        }));
    }

    #[test]
    fn test_standard_handlers_cover_every_key() {
        let f = fixture(&[]);
        let handlers = standard_handlers(f.builders.clone(), f.batch.clone());

        assert_eq!(handlers.len(), EventKind::ALL.len() + WorkflowKey::ALL.len());
        for kind in EventKind::ALL {
            assert!(handlers.iter().any(|(key, _)| *key == TriggerKey::Event(kind)));
        }
        for key in WorkflowKey::ALL {
            assert!(handlers.iter().any(|(k, _)| *k == TriggerKey::Schedule(key)));
        }
    }
}
