use agent_workflow_engine::cli::{self, Cli, Command};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let fixture = cli.fixture.as_deref();

    match cli.command {
        Command::Serve => cli::serve::run(fixture).await,
        Command::Run { workflow_key } => cli::admin::run_workflow(fixture, workflow_key).await,
        Command::Schedules => cli::admin::list_schedules(fixture).await,
        Command::Scheduler { state } => cli::admin::set_scheduler(fixture, state.enabled()).await,
        Command::Status => cli::admin::status(fixture).await,
    }
}
