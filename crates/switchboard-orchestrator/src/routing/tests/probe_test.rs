//! Tests for the background health prober.

use super::MockProvider;
use super::super::probe::HealthProber;
use super::super::router::Router;
use crate::config::BackendConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_probe_once_records_every_backend() {
    let router = Arc::new(Router::default());
    router.register_backend(&BackendConfig::new("up", 1.0, 1), Arc::new(MockProvider::ok(1)));
    router.register_backend(&BackendConfig::new("down", 1.0, 1), Arc::new(MockProvider::failing()));

    let prober = HealthProber::new(Arc::clone(&router));
    let outcomes = prober.probe_once().await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().any(|o| o.backend == "up" && o.success));
    assert!(outcomes.iter().any(|o| o.backend == "down" && !o.success && o.error.is_some()));
    assert_eq!(router.health("up").unwrap().request_count, 1);
    assert!((router.health("down").unwrap().error_rate - 0.1).abs() < 1e-9);
}

#[tokio::test]
async fn test_probe_timeout_counts_as_failure() {
    let router = Arc::new(Router::default());
    router.register_backend(
        &BackendConfig::new("hung", 1.0, 1),
        Arc::new(MockProvider::slow(Duration::from_secs(10))),
    );

    let prober = HealthProber::new(Arc::clone(&router)).with_timeout(Duration::from_millis(20));
    let outcomes = prober.probe_once().await;

    assert!(!outcomes[0].success);
    assert!(outcomes[0].latency < Duration::from_secs(1));
}

#[tokio::test]
async fn test_probe_loop_runs_until_cancelled() {
    let router = Arc::new(Router::default());
    let provider = Arc::new(MockProvider::ok(1));
    router.register_backend(&BackendConfig::new("up", 1.0, 1), provider.clone());

    let token = CancellationToken::new();
    let handle = HealthProber::new(Arc::clone(&router))
        .with_interval(Duration::from_millis(10))
        .spawn(token.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

    let probes = provider.calls();
    assert!(probes >= 2, "expected several probe rounds, got {probes}");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.calls(), probes);
}
