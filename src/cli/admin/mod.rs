//! One-shot admin commands against the configured storage

use std::path::Path;

use chrono::Utc;

use crate::domain::{TriggerContext, WorkflowKey};

/// Force-run a workflow and print its result as JSON
pub async fn run_workflow(fixture: Option<&Path>, key: WorkflowKey) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let engine = super::build_engine(&config, fixture).await?;

    let result = engine
        .admin
        .force_run(key, TriggerContext::new().with_timestamp(Utc::now()))
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn list_schedules(fixture: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let engine = super::build_engine(&config, fixture).await?;

    for record in engine.admin.list_schedules().await? {
        let next = record
            .next_run_at
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| "due".to_string());

        println!(
            "{:<24} {:<8} every {:>6}s  next: {}",
            record.workflow_key,
            if record.enabled { "enabled" } else { "disabled" },
            record.interval_seconds,
            next
        );
    }

    Ok(())
}

pub async fn set_scheduler(fixture: Option<&Path>, enabled: bool) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let engine = super::build_engine(&config, fixture).await?;

    engine.admin.set_scheduler_enabled(enabled).await?;
    println!("scheduler {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

pub async fn status(fixture: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let engine = super::build_engine(&config, fixture).await?;

    let state = engine.admin.status().await?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
