//! Serve command - polls interval schedules until shutdown

use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::infrastructure::observability;

/// Run the scheduler loop; returns after Ctrl-C
pub async fn run(fixture: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config()?;
    observability::init_metrics(&config.metrics)?;

    let engine = super::build_engine(&config, fixture).await?;

    if !config.scheduler.enabled {
        info!("Scheduler polling disabled by configuration; waiting for shutdown");
        shutdown_signal().await;
        return Ok(());
    }

    let poll_interval = Duration::from_secs(config.scheduler.poll_interval_secs.max(1));
    engine
        .scheduler
        .run_until(poll_interval, shutdown_signal())
        .await;

    info!("Scheduler stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
}
