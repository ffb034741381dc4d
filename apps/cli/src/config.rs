//! CLI configuration loading.
//!
//! One TOML file holds every section:
//!
//! ```toml
//! [router]
//! default_strategy = "balanced"
//!
//! [orchestrator]
//! max_concurrent_tasks = 4
//!
//! [workflow]
//! fail_fast = true
//!
//! [[backends]]
//! name = "local"
//! cost_per_unit = 0.0
//! priority = 1
//! latency_ms = 20
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use switchboard_orchestrator::{BackendConfig, ConfigError, OrchestratorConfig, RouterConfig};
use switchboard_workflow::WorkflowConfig;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "switchboard.toml";

/// A simulated backend: routing metadata plus the behaviour of its stand-in
/// provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedBackend {
    pub name: String,

    #[serde(default)]
    pub cost_per_unit: f64,

    #[serde(default)]
    pub priority: i32,

    /// Mean response latency.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    /// Probability in `[0, 1]` that a call fails.
    #[serde(default)]
    pub failure_rate: f64,
}

fn default_latency_ms() -> u64 {
    25
}

impl SimulatedBackend {
    fn new(name: &str, cost_per_unit: f64, priority: i32, latency_ms: u64) -> Self {
        Self { name: name.to_string(), cost_per_unit, priority, latency_ms, failure_rate: 0.0 }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::new(self.name.clone(), self.cost_per_unit, self.priority)
    }
}

/// Complete CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    #[serde(default = "default_backends")]
    pub backends: Vec<SimulatedBackend>,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        Self {
            router: RouterConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            workflow: WorkflowConfig::default(),
            backends: default_backends(),
        }
    }
}

fn default_backends() -> Vec<SimulatedBackend> {
    vec![
        SimulatedBackend::new("local", 0.0, 1, 20),
        SimulatedBackend::new("standard", 0.002, 5, 40),
        SimulatedBackend::new("premium", 0.03, 10, 60),
    ]
}

impl SwitchboardConfig {
    /// Parses and validates a config file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: SwitchboardConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration and reports which file it came from.
    ///
    /// An explicit path must exist. Otherwise `./switchboard.toml` is tried,
    /// then `~/.switchboard/config.toml`, then built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }
        for candidate in search_paths() {
            if candidate.is_file() {
                return Ok((Self::load_from_file(&candidate)?, Some(candidate)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.router.validate()?;
        self.orchestrator.validate()?;
        self.workflow.validate()?;

        if self.backends.is_empty() {
            return Err(ConfigError::Validation("at least one backend must be configured".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            backend.backend_config().validate()?;
            if !seen.insert(backend.name.as_str()) {
                return Err(ConfigError::Validation(format!("duplicate backend '{}'", backend.name)));
            }
            if !(0.0..=1.0).contains(&backend.failure_rate) {
                return Err(ConfigError::Validation(format!(
                    "backend '{}' failure_rate must be within [0, 1], got {}",
                    backend.name, backend.failure_rate
                )));
            }
        }
        Ok(())
    }
}

/// Candidate config files in lookup order.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".switchboard").join("config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use switchboard_orchestrator::RoutingStrategy;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = SwitchboardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backends.len(), 3);
    }

    #[test]
    fn test_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[router]
default_strategy = "cost_optimal"
request_timeout_ms = 500

[orchestrator]
max_concurrent_tasks = 2

[[backends]]
name = "only"
latency_ms = 1
"#
        )
        .unwrap();

        let config = SwitchboardConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.router.default_strategy, RoutingStrategy::CostOptimal);
        assert_eq!(config.router.request_timeout, std::time::Duration::from_millis(500));
        assert_eq!(config.orchestrator.max_concurrent_tasks, 2);
        assert_eq!(config.backends.len(), 1);
        assert!(config.workflow.enable_compression);
    }

    #[test]
    fn test_rejects_duplicate_backends() {
        let mut config = SwitchboardConfig::default();
        config.backends.push(config.backends[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Validation(msg)) if msg.contains("duplicate")));
    }

    #[test]
    fn test_rejects_bad_failure_rate() {
        let mut config = SwitchboardConfig::default();
        config.backends[0].failure_rate = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let result = SwitchboardConfig::discover(Some(Path::new("/nonexistent/switchboard.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
