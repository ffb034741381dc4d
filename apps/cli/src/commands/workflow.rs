//! `swb workflow`: run template workflows against the simulated agents.

use crate::config::SwitchboardConfig;
use crate::simulated::{default_agents, register_backends};
use anyhow::Context;
use clap::{Args, Subcommand};
use colored::{ColoredString, Colorize};
use std::path::PathBuf;
use std::sync::Arc;
use switchboard_orchestrator::{Router, TaskOrchestrator};
use switchboard_workflow::{
    FileContextStore, StepStatus, Template, Workflow, WorkflowEngine, WorkflowStatus,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Subcommand, Debug)]
pub enum WorkflowCommand {
    /// Run a template workflow
    Run(RunArgs),

    /// List the available templates
    Templates,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Template to run (coding, research, problem-solving, content-creation, data-analysis)
    #[arg(short, long, default_value = "coding")]
    pub template: Template,

    /// What the workflow is about
    pub subject: String,

    /// Abort on the first failed step
    #[arg(long)]
    pub fail_fast: bool,

    /// Session id; with --store-dir, history carries over between runs
    #[arg(long)]
    pub session: Option<String>,

    /// Directory holding saved session contexts
    #[arg(long, requires = "session")]
    pub store_dir: Option<PathBuf>,

    /// Output the finished workflow as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(config: &SwitchboardConfig, command: WorkflowCommand) -> anyhow::Result<()> {
    match command {
        WorkflowCommand::Templates => {
            for template in Template::ALL {
                let sample = template.build("<subject>");
                let steps: Vec<&str> = sample.steps.iter().map(|s| s.name.as_str()).collect();
                println!("{:<18} {}", template.to_string().bold(), steps.join(" → "));
            }
            Ok(())
        }
        WorkflowCommand::Run(args) => run(config, args).await,
    }
}

async fn run(config: &SwitchboardConfig, args: RunArgs) -> anyhow::Result<()> {
    let router = Arc::new(Router::new(config.router.clone()));
    register_backends(&router, &config.backends);
    let orchestrator = Arc::new(TaskOrchestrator::new(config.orchestrator.clone())?);
    for agent in default_agents(&router, 1) {
        orchestrator.register_agent(agent).await;
    }

    let mut engine = WorkflowEngine::new(orchestrator.clone());
    if let Some(dir) = &args.store_dir {
        engine = engine.with_store(Arc::new(FileContextStore::new(dir)));
    }

    let mut workflow = args.template.build(&args.subject);
    workflow.config = config.workflow.clone();
    if args.fail_fast {
        workflow.config.fail_fast = true;
    }
    if let Some(session) = &args.session {
        workflow.context.update(|ctx| ctx.session_id.clone_from(session));
    }

    let id = engine.create_workflow(workflow).await?;
    let cancel = CancellationToken::new();
    let execution = engine.execute_workflow(&id, &cancel);
    tokio::pin!(execution);
    let outcome = tokio::select! {
        outcome = &mut execution => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!(workflow_id = %id, "Interrupted, cancelling workflow");
            cancel.cancel();
            execution.await
        }
    };
    orchestrator.shutdown().await;

    let finished = engine.workflow(&id).await.context("workflow disappeared from the registry")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&finished)?);
    } else {
        print_summary(&finished);
    }
    outcome.with_context(|| format!("workflow '{}' failed", finished.name))
}

fn print_summary(workflow: &Workflow) {
    println!("{} {}", "Workflow".bold(), workflow.name);
    for step in &workflow.steps {
        let detail = step
            .error
            .clone()
            .or_else(|| step.response().map(str::to_string))
            .unwrap_or_default();
        println!(
            "  {:<10} {:<22} {:>6}ms  {}",
            step_status(step.status),
            step.name,
            step.duration_ms.unwrap_or(0),
            detail
        );
    }
    let ctx = workflow.context.snapshot();
    println!(
        "{} in {}ms, {} tokens, {} decisions, {} log entries",
        workflow_status(workflow.status),
        workflow.total_duration_ms.unwrap_or(0),
        ctx.tokens_used,
        ctx.key_decisions.len(),
        ctx.conversation_log.len()
    );
}

fn step_status(status: StepStatus) -> ColoredString {
    match status {
        StepStatus::Completed => "completed".green(),
        StepStatus::Failed => "failed".red(),
        StepStatus::Skipped => "skipped".yellow(),
        StepStatus::Running => "running".cyan(),
        StepStatus::Pending => "pending".dimmed(),
    }
}

fn workflow_status(status: WorkflowStatus) -> ColoredString {
    match status {
        WorkflowStatus::Completed => status.to_string().green().bold(),
        WorkflowStatus::Failed => status.to_string().red().bold(),
        WorkflowStatus::Draft | WorkflowStatus::Running => status.to_string().normal(),
    }
}
