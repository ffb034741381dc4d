//! Configuration for the router and the task orchestrator.
//!
//! Every field has a serde default so a partial TOML table is enough.
//! Durations are written as integer milliseconds (`*_ms`) or seconds
//! (`*_secs`).

use crate::retry::RetryPolicy;
use crate::routing::RoutingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Router settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Strategy used when a request does not name one.
    #[serde(default)]
    pub default_strategy: RoutingStrategy,

    /// Timeout for a routed provider call.
    #[serde(rename = "request_timeout_ms", default = "default_request_timeout", with = "duration_ms")]
    pub request_timeout: Duration,

    /// Interval between background health probes.
    #[serde(rename = "probe_interval_secs", default = "default_probe_interval", with = "duration_secs")]
    pub probe_interval: Duration,

    /// Timeout applied to each individual probe.
    #[serde(rename = "probe_timeout_secs", default = "default_probe_timeout", with = "duration_secs")]
    pub probe_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_strategy: RoutingStrategy::default(),
            request_timeout: default_request_timeout(),
            probe_interval: default_probe_interval(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

impl RouterConfig {
    /// Validates the router settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation("request_timeout_ms must be positive".to_string()));
        }
        if self.probe_interval.is_zero() {
            return Err(ConfigError::Validation(
                "probe_interval_secs must be positive".to_string(),
            ));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::Validation("probe_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Static metadata for one routable backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique backend name.
    pub name: String,

    /// Cost per 1000 tokens.
    #[serde(default)]
    pub cost_per_unit: f64,

    /// Higher is preferred.
    #[serde(default)]
    pub priority: i32,
}

impl BackendConfig {
    /// Creates backend metadata.
    pub fn new(name: impl Into<String>, cost_per_unit: f64, priority: i32) -> Self {
        Self { name: name.into(), cost_per_unit, priority }
    }

    /// Validates the backend entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation("backend name must not be empty".to_string()));
        }
        if !self.cost_per_unit.is_finite() || self.cost_per_unit < 0.0 {
            return Err(ConfigError::Validation(format!(
                "backend '{}' cost_per_unit must be a non-negative number, got {}",
                self.name, self.cost_per_unit
            )));
        }
        Ok(())
    }
}

/// Task orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Number of long-lived workers.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,

    /// Queue capacity. Defaults to twice the worker count.
    #[serde(default)]
    pub queue_capacity: Option<usize>,

    /// Capacity of the completed-result channel.
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,

    /// Deadline applied to tasks that do not carry one.
    #[serde(rename = "task_timeout_secs", default = "default_task_timeout", with = "duration_secs")]
    pub task_timeout: Duration,

    /// Interval of the agent health-check routine.
    #[serde(
        rename = "health_check_interval_secs",
        default = "default_health_check_interval",
        with = "duration_secs"
    )]
    pub health_check_interval: Duration,

    /// Interval of the metrics logging routine.
    #[serde(rename = "metrics_interval_secs", default = "default_metrics_interval", with = "duration_secs")]
    pub metrics_interval: Duration,

    /// Retry policy applied to tasks without an explicit budget.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Capability overrides keyed by task category name.
    #[serde(default)]
    pub capabilities: HashMap<String, Vec<String>>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            queue_capacity: None,
            result_buffer: default_result_buffer(),
            task_timeout: default_task_timeout(),
            health_check_interval: default_health_check_interval(),
            metrics_interval: default_metrics_interval(),
            retry: RetryPolicy::default(),
            capabilities: HashMap::new(),
        }
    }
}

fn default_max_concurrent_tasks() -> usize {
    100
}

fn default_result_buffer() -> usize {
    1000
}

fn default_task_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_health_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_metrics_interval() -> Duration {
    Duration::from_secs(60)
}

impl OrchestratorConfig {
    /// Effective queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.max_concurrent_tasks.saturating_mul(2)).max(1)
    }

    /// Loads orchestrator settings from a standalone TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: OrchestratorConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - Worker count and buffers are positive
    /// - Timeouts and intervals are positive
    /// - The retry multiplier is at least 1.0
    /// - Capability overrides name known categories
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(ConfigError::Validation("queue_capacity must be at least 1".to_string()));
        }
        if self.result_buffer == 0 {
            return Err(ConfigError::Validation("result_buffer must be at least 1".to_string()));
        }
        if self.task_timeout.is_zero() {
            return Err(ConfigError::Validation("task_timeout_secs must be positive".to_string()));
        }
        if self.health_check_interval.is_zero() || self.metrics_interval.is_zero() {
            return Err(ConfigError::Validation(
                "background routine intervals must be positive".to_string(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation(format!(
                "retry.backoff_multiplier must be >= 1.0, got {}",
                self.retry.backoff_multiplier
            )));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(ConfigError::Validation(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        crate::CapabilityMap::with_overrides(&self.capabilities)?;
        Ok(())
    }
}

/// Serde adapter for a `Duration` stored as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Serde adapter for a `Duration` stored as integer seconds.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_orchestrator_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrent_tasks, 100);
        assert_eq!(config.queue_capacity(), 200);
        assert_eq!(config.task_timeout, Duration::from_secs(300));
        assert_eq!(config.health_check_interval, Duration::from_secs(30));
        assert_eq!(config.metrics_interval, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: OrchestratorConfig =
            toml::from_str("max_concurrent_tasks = 4\ntask_timeout_secs = 12\n").unwrap();
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.queue_capacity(), 8);
        assert_eq!(config.task_timeout, Duration::from_secs(12));
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let config = OrchestratorConfig { max_concurrent_tasks: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_shrinking_backoff() {
        let mut config = OrchestratorConfig::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_unknown_capability() {
        let mut config = OrchestratorConfig::default();
        config.capabilities.insert("data_cleaning".to_string(), vec!["wizard".to_string()]);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_router_config_from_toml() {
        let config: RouterConfig = toml::from_str(
            "default_strategy = \"cost_optimal\"\nrequest_timeout_ms = 1500\nprobe_interval_secs = 5\n",
        )
        .unwrap();
        assert_eq!(config.default_strategy, RoutingStrategy::CostOptimal);
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_validation() {
        assert!(BackendConfig::new("fast", 0.5, 2).validate().is_ok());
        assert!(BackendConfig::new("", 0.5, 2).validate().is_err());
        assert!(BackendConfig::new("neg", -1.0, 2).validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrent_tasks = 3").unwrap();
        writeln!(file, "[retry]").unwrap();
        writeln!(file, "max_retries = 1").unwrap();

        let config = OrchestratorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.max_concurrent_tasks, 3);
        assert_eq!(config.retry.max_retries, 1);
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = OrchestratorConfig::load_from_file("/nonexistent/switchboard.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
