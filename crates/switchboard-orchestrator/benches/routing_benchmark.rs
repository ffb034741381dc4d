//! Performance benchmarks for backend selection and task dispatch.
//!
//! Selection is pure bookkeeping over the health registry and should stay in
//! the low microseconds even with dozens of backends. Dispatch measures the
//! orchestrator overhead around an agent that returns immediately.

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;
use switchboard_abstraction::{
    AgentCategory, AgentError, Provider, ProviderError, ProviderRequest, ProviderResponse, Task, TaskCategory,
};
use switchboard_orchestrator::{
    BackendConfig, FnAgent, OrchestratorConfig, Router, RoutingStrategy, TaskOrchestrator,
};
use tokio::runtime::Runtime;

/// Provider that answers immediately.
struct InstantProvider;

#[async_trait]
impl Provider for InstantProvider {
    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse { content: request.prompt.clone(), tokens_used: 8, model: None })
    }
}

fn router_with(backends: usize) -> Router {
    let router = Router::default();
    for i in 0..backends {
        let config = BackendConfig::new(format!("backend-{i}"), (i % 7) as f64 * 0.25, (i % 5) as i32);
        router.register_backend(&config, Arc::new(InstantProvider));
        // Spread latencies so Performance and Balanced have work to do
        let latency = Duration::from_millis(10 + (i as u64 * 37) % 400);
        let _ = router.record_outcome(&format!("backend-{i}"), true, latency);
    }
    router
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");

    for backends in [4usize, 32] {
        let router = router_with(backends);
        for strategy in [
            RoutingStrategy::CostOptimal,
            RoutingStrategy::Performance,
            RoutingStrategy::RoundRobin,
            RoutingStrategy::PriorityFailover,
            RoutingStrategy::Balanced,
        ] {
            group.bench_with_input(
                BenchmarkId::new(strategy.to_string(), backends),
                &strategy,
                |b, &strategy| {
                    b.iter(|| black_box(router.select(&[], strategy, None)));
                },
            );
        }
    }

    group.finish();
}

fn bench_route(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let router = router_with(8);
    let request = ProviderRequest::new("benchmark prompt");

    c.bench_function("route_balanced", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(router.route(&request, Some(RoutingStrategy::Balanced), None).await)
        });
    });
}

fn bench_process_task(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let orchestrator = TaskOrchestrator::new(OrchestratorConfig::default()).unwrap();
    rt.block_on(async {
        for i in 0..8 {
            orchestrator
                .register_agent(Arc::new(FnAgent::new(
                    format!("data-{i}"),
                    AgentCategory::Data,
                    |_task: Task| async { Ok::<_, AgentError>(json!({"ok": true})) },
                )))
                .await;
        }
    });

    c.bench_function("process_task", |b| {
        b.to_async(&rt).iter(|| async {
            let task = Task::new(TaskCategory::DataCleaning, json!({"rows": 10}));
            black_box(orchestrator.process_task(task).await)
        });
    });
}

criterion_group!(benches, bench_select, bench_route, bench_process_task);
criterion_main!(benches);
