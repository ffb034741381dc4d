//! Health-aware router.
//!
//! The router owns the backend providers and their health registry. It picks
//! a backend per request with a [`RoutingStrategy`], optionally invokes it,
//! and folds every outcome back into the health records.

use super::health::HealthRegistry;
use super::strategy;
use super::types::{BackendHealth, RouteResponse, RoutingStrategy};
use crate::config::{BackendConfig, RouterConfig};
use crate::error::{OrchestrationError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use switchboard_abstraction::{Provider, ProviderError, ProviderRequest};
use tracing::{debug, info, warn};

/// Routes requests across registered backends.
pub struct Router {
    config: RouterConfig,
    health: Arc<HealthRegistry>,
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
    round_robin: AtomicU64,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.config)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

impl Router {
    /// Creates a router with no backends.
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            health: Arc::new(HealthRegistry::new()),
            providers: RwLock::new(HashMap::new()),
            round_robin: AtomicU64::new(0),
        }
    }

    /// Router settings.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Shared handle to the health registry.
    pub fn health_registry(&self) -> Arc<HealthRegistry> {
        Arc::clone(&self.health)
    }

    /// Registers a backend and its provider.
    ///
    /// # Arguments
    /// * `backend` - Static backend metadata
    /// * `provider` - The provider invoked when the backend is selected
    ///
    /// # Returns
    /// Returns `true` if the backend was newly registered, `false` if it replaced an existing one.
    pub fn register_backend(&self, backend: &BackendConfig, provider: Arc<dyn Provider>) -> bool {
        debug!(
            backend = %backend.name,
            cost_per_unit = backend.cost_per_unit,
            priority = backend.priority,
            "Registering backend"
        );
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(backend.name.clone(), provider);
        self.health
            .register(&backend.name, BackendHealth::new(backend.cost_per_unit, backend.priority))
    }

    /// Registered backend names in registration order.
    pub fn backends(&self) -> Vec<String> {
        self.health.names()
    }

    fn provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    /// Providers in registration order.
    pub(crate) fn provider_handles(&self) -> Vec<(String, Arc<dyn Provider>)> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        self.health
            .names()
            .into_iter()
            .filter_map(|name| providers.get(&name).map(|p| (name, Arc::clone(p))))
            .collect()
    }

    /// Selects a backend.
    ///
    /// # Arguments
    /// * `eligible` - Candidate backends in preference order; empty means all registered
    /// * `strategy` - Strategy applied to the available candidates
    /// * `preferred` - Backend to use if it is eligible and currently available
    ///
    /// # Returns
    /// The chosen backend name, or `NoBackendsAvailable` if no candidate is available.
    pub fn select(
        &self,
        eligible: &[String],
        strategy: RoutingStrategy,
        preferred: Option<&str>,
    ) -> Result<String> {
        if let Some(preferred) = preferred {
            let allowed = eligible.is_empty() || eligible.iter().any(|name| name == preferred);
            match self.health.get(preferred) {
                Some(_) if !allowed => debug!(backend = %preferred, "Preferred backend not eligible"),
                Some(health) if health.available => {
                    debug!(backend = %preferred, "Using preferred backend");
                    return Ok(preferred.to_string());
                }
                Some(_) => debug!(backend = %preferred, "Preferred backend unavailable"),
                None => debug!(backend = %preferred, "Preferred backend not registered"),
            }
        }

        let snapshot = self.health.snapshot();
        let mut candidates: Vec<(String, BackendHealth)> = if eligible.is_empty() {
            snapshot.into_iter().filter(|(_, health)| health.available).collect()
        } else {
            let by_name: HashMap<String, BackendHealth> = snapshot.into_iter().collect();
            eligible
                .iter()
                .filter_map(|name| {
                    by_name
                        .get(name)
                        .filter(|health| health.available)
                        .map(|health| (name.clone(), health.clone()))
                })
                .collect()
        };

        let tick = if strategy == RoutingStrategy::RoundRobin {
            self.round_robin.fetch_add(1, Ordering::Relaxed)
        } else {
            0
        };

        let Some(index) = strategy::choose(strategy, &candidates, tick) else {
            warn!(strategy = %strategy, "No backends available");
            return Err(OrchestrationError::NoBackendsAvailable);
        };
        let (name, _) = candidates.swap_remove(index);
        debug!(backend = %name, strategy = %strategy, "Selected backend");
        Ok(name)
    }

    /// Folds a call outcome into a backend's health record.
    pub fn record_outcome(
        &self,
        backend: &str,
        success: bool,
        latency: Duration,
    ) -> Result<BackendHealth> {
        self.health
            .record_outcome(backend, success, latency)
            .ok_or_else(|| OrchestrationError::BackendNotFound(backend.to_string()))
    }

    /// Selects a backend among all registered ones and invokes it.
    ///
    /// Uses the configured default strategy when `strategy` is `None`.
    pub async fn route(
        &self,
        request: &ProviderRequest,
        strategy: Option<RoutingStrategy>,
        preferred: Option<&str>,
    ) -> Result<RouteResponse> {
        self.route_among(&[], request, strategy, preferred).await
    }

    /// Selects a backend among `eligible` and invokes it.
    ///
    /// The call runs under the configured request timeout and its outcome is
    /// recorded whether it succeeds or not.
    pub async fn route_among(
        &self,
        eligible: &[String],
        request: &ProviderRequest,
        strategy: Option<RoutingStrategy>,
        preferred: Option<&str>,
    ) -> Result<RouteResponse> {
        let strategy = strategy.unwrap_or(self.config.default_strategy);
        let backend = self.select(eligible, strategy, preferred)?;
        let provider = self
            .provider(&backend)
            .ok_or_else(|| OrchestrationError::BackendNotFound(backend.clone()))?;

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.config.request_timeout, provider.invoke(request)).await;
        let latency = started.elapsed();

        let outcome = match outcome {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.request_timeout)),
        };

        match outcome {
            Ok(response) => {
                let health = self.record_outcome(&backend, true, latency)?;
                let cost = health.cost_for(response.tokens_used);
                info!(
                    backend = %backend,
                    strategy = %strategy,
                    latency_ms = latency.as_millis() as u64,
                    tokens = response.tokens_used,
                    cost,
                    "Request routed"
                );
                Ok(RouteResponse { backend, strategy, response, latency, cost })
            }
            Err(source) => {
                self.record_outcome(&backend, false, latency)?;
                warn!(backend = %backend, error = %source, "Routed request failed");
                Err(OrchestrationError::Provider { backend, source })
            }
        }
    }

    /// Copy of one backend's health record.
    pub fn health(&self, backend: &str) -> Option<BackendHealth> {
        self.health.get(backend)
    }

    /// Health of every backend in registration order.
    pub fn health_report(&self) -> Vec<(String, BackendHealth)> {
        self.health.snapshot()
    }
}
