//! `swb submit`: queue tasks on the orchestrator's worker pool.

use crate::config::SwitchboardConfig;
use crate::simulated::{default_agents, register_backends};
use anyhow::{Context, bail};
use clap::Args;
use colored::Colorize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use switchboard_abstraction::{Task, TaskCategory, TaskPriority, TaskResult};
use switchboard_orchestrator::{Router, TaskOrchestrator};
use tracing::info;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Task payload. JSON is sent as is, anything else as a message.
    pub payload: String,

    /// Task category (e.g. conversation, data_cleaning, model_training)
    #[arg(short, long, default_value = "conversation")]
    pub category: TaskCategory,

    /// Number of copies to submit
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Task priority (low, medium, high, critical)
    #[arg(long)]
    pub priority: Option<TaskPriority>,

    /// Per-task deadline in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(config: &SwitchboardConfig, args: SubmitArgs) -> anyhow::Result<()> {
    let router = Arc::new(Router::new(config.router.clone()));
    register_backends(&router, &config.backends);

    let orchestrator = TaskOrchestrator::new(config.orchestrator.clone())?;
    let replicas = args.count.min(config.orchestrator.max_concurrent_tasks);
    for agent in default_agents(&router, replicas) {
        orchestrator.register_agent(agent).await;
    }
    orchestrator.start()?;
    let mut results = orchestrator.take_results().context("result channel already taken")?;

    let payload = serde_json::from_str::<Value>(&args.payload)
        .unwrap_or_else(|_| json!({ "message": args.payload }));
    for _ in 0..args.count {
        let mut task = Task::new(args.category, payload.clone());
        if let Some(priority) = args.priority {
            task = task.with_priority(priority);
        }
        if let Some(secs) = args.timeout_secs {
            task = task.with_timeout(Duration::from_secs(secs));
        }
        let id = orchestrator.submit_task(task)?;
        info!(task_id = %id, "Task submitted");
    }

    let wait = args
        .timeout_secs
        .map_or(config.orchestrator.task_timeout, Duration::from_secs)
        + Duration::from_secs(5);
    let mut collected: Vec<TaskResult> = Vec::with_capacity(args.count);
    while collected.len() < args.count {
        match tokio::time::timeout(wait, results.recv()).await {
            Ok(Some(result)) => {
                if !args.json {
                    print_result(&result);
                }
                collected.push(result);
            }
            Ok(None) => break,
            Err(_) => {
                eprintln!("Timed out waiting for {} result(s)", args.count - collected.len());
                break;
            }
        }
    }

    let metrics = orchestrator.system_metrics().await;
    orchestrator.shutdown().await;

    if args.json {
        let output = json!({ "results": collected, "metrics": metrics });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        println!(
            "{} completed, {} failed, {} agents",
            metrics.completed_tasks, metrics.failed_tasks, metrics.total_agents
        );
    }

    let failed = collected.iter().filter(|r| !r.success).count();
    if failed > 0 || collected.len() < args.count {
        bail!("{} of {} tasks did not complete", args.count - (collected.len() - failed), args.count);
    }
    Ok(())
}

fn print_result(result: &TaskResult) {
    if result.success {
        let data = result.data.as_ref().map_or_else(String::new, |data| {
            data.get("response")
                .or_else(|| data.get("content"))
                .and_then(Value::as_str)
                .map_or_else(|| data.to_string(), str::to_string)
        });
        println!(
            "{} {} in {}ms ({} attempt(s)): {}",
            "✓".green(),
            result.task_id,
            result.metrics.execution_time.as_millis(),
            result.metrics.attempts,
            data
        );
    } else if let Some(error) = &result.error {
        println!("{} {}: {}", "✗".red(), result.task_id, error);
    }
}
