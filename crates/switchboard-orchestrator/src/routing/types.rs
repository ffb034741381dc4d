//! Types for the health-aware router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use switchboard_abstraction::ProviderResponse;

/// Error rate at which a backend is taken out of rotation.
pub const UNAVAILABLE_ERROR_RATE: f64 = 0.5;

/// Error rate below which a successful call restores a backend.
pub const RECOVERY_ERROR_RATE: f64 = 0.1;

/// Added to the error rate on every failure.
pub const FAILURE_PENALTY: f64 = 0.1;

/// Multiplied into the error rate on every success.
pub const SUCCESS_DECAY: f64 = 0.9;

// Absorbs float drift so that five penalties from zero reach the threshold.
const RATE_EPSILON: f64 = 1e-9;

/// Selection strategy applied to the available backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Lowest cost per unit.
    CostOptimal,
    /// Lowest observed latency.
    Performance,
    /// Rotate through candidates.
    RoundRobin,
    /// Highest static priority.
    #[serde(alias = "failover")]
    PriorityFailover,
    /// Weighted blend of priority, reliability, latency and cost.
    #[default]
    Balanced,
}

impl fmt::Display for RoutingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingStrategy::CostOptimal => write!(f, "cost_optimal"),
            RoutingStrategy::Performance => write!(f, "performance"),
            RoutingStrategy::RoundRobin => write!(f, "round_robin"),
            RoutingStrategy::PriorityFailover => write!(f, "priority_failover"),
            RoutingStrategy::Balanced => write!(f, "balanced"),
        }
    }
}

impl FromStr for RoutingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cost_optimal" | "cost" => Ok(RoutingStrategy::CostOptimal),
            "performance" | "latency" => Ok(RoutingStrategy::Performance),
            "round_robin" => Ok(RoutingStrategy::RoundRobin),
            "priority_failover" | "failover" | "priority" => Ok(RoutingStrategy::PriorityFailover),
            "balanced" => Ok(RoutingStrategy::Balanced),
            _ => Err(format!("unknown routing strategy '{}'", s)),
        }
    }
}

/// Health telemetry for one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub available: bool,
    /// Moving average of call latency in seconds.
    pub latency_seconds: f64,
    /// Smoothed failure ratio in `[0, 1]`.
    pub error_rate: f64,
    /// Cost per 1000 tokens.
    pub cost_per_unit: f64,
    /// Higher is preferred.
    pub priority: i32,
    pub request_count: u64,
    pub last_check: DateTime<Utc>,
}

impl BackendHealth {
    /// Fresh, available backend with no history.
    pub fn new(cost_per_unit: f64, priority: i32) -> Self {
        Self {
            available: true,
            latency_seconds: 0.0,
            error_rate: 0.0,
            cost_per_unit,
            priority,
            request_count: 0,
            last_check: Utc::now(),
        }
    }

    /// Folds one call outcome into the record.
    ///
    /// Latency becomes `(old + new) / 2`. A failure adds a fixed penalty to
    /// the error rate and takes the backend out of rotation once the rate
    /// reaches 0.5; a success decays the rate and restores the backend once
    /// it drops below 0.1.
    pub fn record(&mut self, success: bool, latency: Duration) {
        self.latency_seconds = (self.latency_seconds + latency.as_secs_f64()) / 2.0;
        self.request_count += 1;
        self.last_check = Utc::now();

        if success {
            self.error_rate *= SUCCESS_DECAY;
            if self.error_rate < RECOVERY_ERROR_RATE {
                self.available = true;
            }
        } else {
            self.error_rate = (self.error_rate + FAILURE_PENALTY).min(1.0);
        }

        if self.error_rate >= UNAVAILABLE_ERROR_RATE - RATE_EPSILON {
            self.available = false;
        }
    }

    /// Cost of serving `tokens` tokens on this backend.
    pub fn cost_for(&self, tokens: u32) -> f64 {
        self.cost_per_unit * f64::from(tokens) / 1000.0
    }
}

/// Outcome of a routed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Backend that served the request.
    pub backend: String,
    /// Strategy that picked it.
    pub strategy: RoutingStrategy,
    pub response: ProviderResponse,
    pub latency: Duration,
    /// `cost_per_unit * tokens_used / 1000`.
    pub cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("cost-optimal".parse::<RoutingStrategy>().unwrap(), RoutingStrategy::CostOptimal);
        assert_eq!("failover".parse::<RoutingStrategy>().unwrap(), RoutingStrategy::PriorityFailover);
        assert_eq!("Balanced".parse::<RoutingStrategy>().unwrap(), RoutingStrategy::Balanced);
        assert!("random".parse::<RoutingStrategy>().is_err());
        assert_eq!(RoutingStrategy::RoundRobin.to_string(), "round_robin");
    }

    #[test]
    fn test_strategy_serde_alias() {
        let strategy: RoutingStrategy = serde_json::from_str("\"failover\"").unwrap();
        assert_eq!(strategy, RoutingStrategy::PriorityFailover);
        assert_eq!(serde_json::to_string(&RoutingStrategy::CostOptimal).unwrap(), "\"cost_optimal\"");
    }

    #[test]
    fn test_five_failures_disable_backend() {
        let mut health = BackendHealth::new(1.0, 1);
        for _ in 0..4 {
            health.record(false, Duration::from_secs(5));
            assert!(health.available);
        }
        health.record(false, Duration::from_secs(5));
        assert!(health.error_rate >= 0.5 - 1e-9);
        assert!(!health.available);
        assert_eq!(health.request_count, 5);
    }

    #[test]
    fn test_error_rate_is_capped() {
        let mut health = BackendHealth::new(1.0, 1);
        for _ in 0..30 {
            health.record(false, Duration::from_millis(10));
        }
        assert!((health.error_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recovery_requires_low_error_rate() {
        let mut health = BackendHealth::new(1.0, 1);
        for _ in 0..5 {
            health.record(false, Duration::from_millis(10));
        }
        assert!(!health.available);

        // One success decays the rate but it stays above the recovery bar.
        health.record(true, Duration::from_millis(10));
        assert!(!health.available);

        while health.error_rate >= RECOVERY_ERROR_RATE {
            health.record(true, Duration::from_millis(10));
        }
        assert!(health.available);
    }

    #[test]
    fn test_latency_moving_average() {
        let mut health = BackendHealth::new(0.0, 0);
        health.record(true, Duration::from_secs(2));
        assert!((health.latency_seconds - 1.0).abs() < 1e-9);
        health.record(true, Duration::from_secs(3));
        assert!((health.latency_seconds - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_for_tokens() {
        let health = BackendHealth::new(2.0, 0);
        assert!((health.cost_for(500) - 1.0).abs() < 1e-9);
    }
}
