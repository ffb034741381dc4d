//! Background health probing.

use super::router::Router;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use switchboard_abstraction::{ProviderError, ProviderRequest};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of probing one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub backend: String,
    pub success: bool,
    pub latency: Duration,
    pub error: Option<String>,
}

/// Periodically probes every backend and records the outcome.
#[derive(Debug, Clone)]
pub struct HealthProber {
    router: Arc<Router>,
    interval: Duration,
    timeout: Duration,
}

impl HealthProber {
    /// Creates a prober using the router's configured interval and timeout.
    pub fn new(router: Arc<Router>) -> Self {
        let interval = router.config().probe_interval;
        let timeout = router.config().probe_timeout;
        Self { router, interval, timeout }
    }

    /// Overrides the probe interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides the per-probe timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probes all backends concurrently, once.
    pub async fn probe_once(&self) -> Vec<ProbeOutcome> {
        let probes = self.router.provider_handles().into_iter().map(|(backend, provider)| {
            let router = Arc::clone(&self.router);
            let timeout = self.timeout;
            async move {
                let request = ProviderRequest::probe();
                let started = Instant::now();
                let result = match tokio::time::timeout(timeout, provider.invoke(&request)).await {
                    Ok(result) => result.map(|_| ()),
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                };
                let latency = started.elapsed();
                let success = result.is_ok();

                if let Err(e) = router.record_outcome(&backend, success, latency) {
                    debug!(backend = %backend, error = %e, "Probed backend vanished");
                }
                let error = result.err().map(|e| {
                    warn!(backend = %backend, error = %e, "Health probe failed");
                    e.to_string()
                });

                ProbeOutcome { backend, success, latency, error }
            }
        });

        join_all(probes).await
    }

    /// Spawns the probe loop. The first round runs one interval after start.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Health prober started");
            let mut ticker = tokio::time::interval_at(
                tokio::time::Instant::now() + self.interval,
                self.interval,
            );
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcomes = self.probe_once().await;
                        let healthy = outcomes.iter().filter(|o| o.success).count();
                        debug!(probed = outcomes.len(), healthy, "Health probe round finished");
                    }
                }
            }
            info!("Health prober stopped");
        })
    }
}
