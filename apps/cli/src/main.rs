//! Switchboard CLI
//!
//! The `swb` binary drives the router, the task orchestrator and the
//! workflow engine against simulated backends described in a TOML file.

mod commands;
mod config;
mod simulated;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use commands::config::ConfigCommand;
use commands::route::RouteArgs;
use commands::submit::SubmitArgs;
use commands::workflow::WorkflowCommand;
use config::SwitchboardConfig;

/// Switchboard - route prompts, run tasks and chain workflow steps
#[derive(Parser, Debug)]
#[command(name = "swb", author, version, about = "Switchboard - multi-backend task orchestration")]
struct Args {
    /// Configuration file (defaults to ./switchboard.toml, then ~/.switchboard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Route a prompt through the configured backends
    Route(RouteArgs),

    /// Submit tasks to the orchestrator's worker pool
    Submit(SubmitArgs),

    /// Run or list workflow templates
    #[command(subcommand)]
    Workflow(WorkflowCommand),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs);

    let (config, source) = SwitchboardConfig::discover(args.config.as_deref())?;
    debug!(source = ?source, backends = config.backends.len(), "Configuration loaded");

    match args.command {
        Command::Route(route) => commands::route::execute(&config, route).await,
        Command::Submit(submit) => commands::submit::execute(&config, submit).await,
        Command::Workflow(workflow) => commands::workflow::execute(&config, workflow).await,
        Command::Config(command) => commands::config::execute(&config, source.as_deref(), command),
    }
}
