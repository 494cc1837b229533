//! Prometheus metrics

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::domain::DomainError;

/// Install the global recorder and the exporter's HTTP listener
pub fn init_metrics(config: &MetricsConfig) -> Result<bool, DomainError> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return Ok(false);
    }

    let addr: SocketAddr = config.listen_addr.parse().map_err(|e| {
        DomainError::configuration(format!(
            "Invalid metrics listen address '{}': {}",
            config.listen_addr, e
        ))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| {
            DomainError::configuration(format!("Failed to install metrics exporter: {}", e))
        })?;

    gauge!("agent_engine_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::info!(%addr, "Prometheus metrics exporter listening");

    Ok(true)
}

/// One attempt against one model inside the fallback chain
pub fn record_llm_attempt(model: &str, outcome: &str, duration: Duration) {
    let labels = [("model", model.to_string()), ("outcome", outcome.to_string())];

    counter!("llm_attempts_total", &labels).increment(1);
    histogram!("llm_attempt_duration_seconds", &labels).record(duration.as_secs_f64());
}

pub fn record_llm_tokens(model: &str, tokens: u64) {
    counter!("llm_tokens_total", "model" => model.to_string()).increment(tokens);
}

/// Claim attempt on a schedule record
pub fn record_schedule_claim(workflow_key: &str, won: bool) {
    let outcome = if won { "won" } else { "lost" };
    counter!(
        "schedule_claims_total",
        "workflow_key" => workflow_key.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// One completed agent run
pub fn record_agent_run(trigger: &str, success: bool, iterations: u32, duration: Duration) {
    let status = if success { "success" } else { "error" };
    let labels = [("trigger", trigger.to_string()), ("status", status.to_string())];

    counter!("agent_runs_total", &labels).increment(1);
    histogram!("agent_run_iterations", &labels).record(iterations as f64);
    histogram!("agent_run_duration_seconds", &labels).record(duration.as_secs_f64());
}

pub fn record_action(action: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        "agent_actions_total",
        "action" => action.to_string(),
        "status" => status
    )
    .increment(1);
}

/// A whole batch, or one agent inside it, that did not run
pub fn record_batch_skip(reason: &str) {
    counter!("batch_skips_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_side_effect_failure(effect: &str) {
    counter!("side_effect_failures_total", "effect" => effect.to_string()).increment(1);
}
