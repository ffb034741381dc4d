//! Workflow execution settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use switchboard_abstraction::TaskCategory;
use switchboard_orchestrator::ConfigError;

/// Per-workflow settings.
///
/// Sizes are measured in bytes of the context's JSON encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Size the context should stay under; exceeding it after compression is logged.
    #[serde(default = "default_max_context_size")]
    pub max_context_size: usize,

    /// Whether oversized contexts are compressed between steps.
    #[serde(default = "default_true")]
    pub enable_compression: bool,

    /// Context size above which compression runs.
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,

    /// Whether step outputs are turned into key decisions.
    #[serde(default = "default_true")]
    pub enable_decision_tracking: bool,

    /// Abort the workflow on the first failed step.
    #[serde(default)]
    pub fail_fast: bool,

    /// Category used for steps that do not set one.
    #[serde(default = "default_step_category")]
    pub default_category: TaskCategory,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_context_size: default_max_context_size(),
            enable_compression: true,
            compression_threshold: default_compression_threshold(),
            enable_decision_tracking: true,
            fail_fast: false,
            default_category: default_step_category(),
        }
    }
}

fn default_max_context_size() -> usize {
    50_000
}

fn default_compression_threshold() -> usize {
    40_000
}

fn default_true() -> bool {
    true
}

fn default_step_category() -> TaskCategory {
    TaskCategory::Conversation
}

impl WorkflowConfig {
    /// Loads settings from a standalone TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: WorkflowConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression_threshold == 0 {
            return Err(ConfigError::Validation(
                "compression_threshold must be positive".to_string(),
            ));
        }
        if self.compression_threshold > self.max_context_size {
            return Err(ConfigError::Validation(format!(
                "compression_threshold ({}) must not exceed max_context_size ({})",
                self.compression_threshold, self.max_context_size
            )));
        }
        Ok(())
    }
}
