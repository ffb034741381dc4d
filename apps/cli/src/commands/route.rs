//! `swb route`: send prompts through the health-aware router.

use crate::config::SwitchboardConfig;
use crate::simulated::register_backends;
use anyhow::bail;
use clap::Args;
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;
use switchboard_abstraction::ProviderRequest;
use switchboard_orchestrator::{Router, RoutingStrategy};

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Prompt to send
    pub prompt: String,

    /// Routing strategy (balanced, cost-optimal, performance, round-robin, priority-failover)
    #[arg(short, long)]
    pub strategy: Option<RoutingStrategy>,

    /// Backend to use whenever it is available
    #[arg(long)]
    pub prefer: Option<String>,

    /// Number of requests to send
    #[arg(short = 'n', long, default_value_t = 1)]
    pub requests: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(config: &SwitchboardConfig, args: RouteArgs) -> anyhow::Result<()> {
    let router = Arc::new(Router::new(config.router.clone()));
    register_backends(&router, &config.backends);

    let request = ProviderRequest::new(args.prompt.clone());
    let mut responses = Vec::new();
    let mut failures = Vec::new();
    for _ in 0..args.requests {
        match router.route(&request, args.strategy, args.prefer.as_deref()).await {
            Ok(routed) => {
                if !args.json {
                    println!(
                        "{} {} ({}) {}ms cost {:.6}: {}",
                        "→".green(),
                        routed.backend.bold(),
                        routed.strategy,
                        routed.latency.as_millis(),
                        routed.cost,
                        routed.response.content
                    );
                }
                responses.push(routed);
            }
            Err(e) => {
                if !args.json {
                    println!("{} {} ({})", "✗".red(), e, e.kind());
                }
                failures.push(json!({ "kind": e.kind(), "message": e.to_string() }));
            }
        }
    }

    let report = router.health_report();
    if args.json {
        let health: Vec<_> = report
            .iter()
            .map(|(name, health)| json!({ "backend": name, "health": health }))
            .collect();
        let output = json!({ "responses": responses, "failures": failures, "health": health });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        println!("{}", "Backend health".bold());
        for (name, health) in &report {
            let state = if health.available { "available".green() } else { "unavailable".red() };
            println!(
                "  {:<12} {:<11} latency {:>6.3}s  error rate {:.2}  requests {}",
                name, state, health.latency_seconds, health.error_rate, health.request_count
            );
        }
    }

    if responses.is_empty() && !failures.is_empty() {
        bail!("all {} requests failed", failures.len());
    }
    Ok(())
}
