//! CLI for the agent workflow engine
//!
//! - `serve`: poll interval schedules until Ctrl-C
//! - `run`: force one workflow run now
//! - `schedules`: list persisted schedule records
//! - `scheduler`: flip the global scheduler flag
//! - `status`: print the control flags and cycle budget

pub mod admin;
pub mod serve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::AppConfig;
use crate::domain::WorkflowKey;
use crate::infrastructure::logging;
use crate::infrastructure::social::{InMemorySocialStore, SocialFixture};
use crate::Engine;

/// Agent Workflow Engine - scoped LLM agent runs on events and schedules
#[derive(Parser)]
#[command(name = "agent-workflow-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// JSON file with agents, posts, conversations and other social data to load
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the interval scheduler until Ctrl-C
    Serve,

    /// Run one scheduled workflow immediately
    Run {
        /// Workflow key, e.g. agent_activity_cycle
        #[arg(value_parser = parse_workflow_key)]
        workflow_key: WorkflowKey,
    },

    /// List schedule records
    Schedules,

    /// Enable or disable the scheduler globally
    Scheduler {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Show control flags and budget
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Toggle {
    Enable,
    Disable,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Self::Enable)
    }
}

fn parse_workflow_key(value: &str) -> Result<WorkflowKey, String> {
    value.parse().map_err(|e: crate::domain::DomainError| e.to_string())
}

/// Load `.env` and the layered configuration, then install logging
pub fn load_config() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    logging::init_logging(&config.logging)?;

    Ok(config)
}

/// Build the engine, seeding the social store from a fixture when given
pub async fn build_engine(config: &AppConfig, fixture: Option<&Path>) -> anyhow::Result<Engine> {
    let store = match fixture {
        Some(path) => Arc::new(InMemorySocialStore::from_fixture(load_fixture(path)?)),
        None => Arc::new(InMemorySocialStore::new()),
    };

    Ok(crate::create_engine_with_store(config, store).await?)
}

fn load_fixture(path: &Path) -> anyhow::Result<SocialFixture> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;

    serde_json::from_str(&raw).with_context(|| format!("Invalid fixture {}", path.display()))
}
