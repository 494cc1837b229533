//! Observability infrastructure - Prometheus metrics

mod metrics;

pub use metrics::{
    init_metrics, record_action, record_agent_run, record_batch_skip, record_llm_attempt,
    record_llm_tokens, record_schedule_claim, record_side_effect_failure,
};
