// Error types for routing and orchestration

use crate::config::ConfigError;
use std::time::Duration;
use switchboard_abstraction::{ErrorKind, ProviderError, TaskCategory};
use thiserror::Error;

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

/// Orchestration errors
///
/// These are structural failures returned to the caller directly. Failures
/// that happen while an agent works on a task are reported as an unsuccessful
/// `TaskResult` instead.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// No registered backend is currently available
    #[error("No backends available")]
    NoBackendsAvailable,

    /// The named backend was never registered
    #[error("Backend '{0}' is not registered")]
    BackendNotFound(String),

    /// The selected backend's provider call failed
    #[error("Backend '{backend}' failed: {source}")]
    Provider {
        /// Backend name
        backend: String,
        /// Underlying provider error
        #[source]
        source: ProviderError,
    },

    /// No idle agent can handle the task category
    #[error("No suitable agent for task category '{0}'")]
    NoSuitableAgent(TaskCategory),

    /// The task queue is saturated
    #[error("Task queue is full (capacity {0})")]
    QueueFull(usize),

    /// The orchestrator no longer accepts work
    #[error("Orchestrator is shutting down")]
    ShuttingDown,

    /// The operation was cancelled before it started
    #[error("Operation cancelled")]
    Cancelled,

    /// Timed out waiting for a background routine to stop
    #[error("Timed out after {0:?} waiting for shutdown")]
    ShutdownTimeout(Duration),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl OrchestrationError {
    /// Machine-readable classification of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoBackendsAvailable => ErrorKind::NoBackendsAvailable,
            Self::BackendNotFound(_) => ErrorKind::BackendNotFound,
            Self::Provider { .. } => ErrorKind::ProviderError,
            Self::NoSuitableAgent(_) => ErrorKind::NoSuitableAgent,
            Self::QueueFull(_) => ErrorKind::QueueFull,
            Self::ShuttingDown | Self::ShutdownTimeout(_) => ErrorKind::ShuttingDown,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(OrchestrationError::QueueFull(4).kind(), ErrorKind::QueueFull);
        assert_eq!(
            OrchestrationError::NoSuitableAgent(TaskCategory::DataCleaning).kind(),
            ErrorKind::NoSuitableAgent
        );
        let err = OrchestrationError::Provider {
            backend: "primary".to_string(),
            source: ProviderError::Unavailable("down".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::ProviderError);
        assert_eq!(err.to_string(), "Backend 'primary' failed: Provider unavailable: down");
    }
}
