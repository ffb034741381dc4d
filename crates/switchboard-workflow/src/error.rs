// Error types for workflow execution

use switchboard_abstraction::ErrorKind;
use switchboard_orchestrator::{ConfigError, OrchestrationError};
use thiserror::Error;

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors that can occur while building or running a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No workflow is registered under the id.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// The workflow is already being executed.
    #[error("Workflow '{0}' is already running")]
    AlreadyRunning(String),

    /// A step finished unsuccessfully.
    #[error("Step '{step_id}' failed ({kind}): {message}")]
    StepFailed {
        /// Id of the failed step
        step_id: String,
        /// Failure classification
        kind: ErrorKind,
        /// Failure detail
        message: String,
    },

    /// A step condition could not be evaluated.
    #[error("Condition evaluation error: {0}")]
    Condition(String),

    /// The task executor rejected a step before running it.
    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    /// Execution was cancelled.
    #[error("Workflow cancelled")]
    Cancelled,

    /// Context persistence failed.
    #[error("Context store error: {0}")]
    Store(String),

    /// Invalid workflow definition or configuration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl WorkflowError {
    /// Machine-readable classification of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WorkflowNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyRunning(_) | Self::Validation(_) | Self::Config(_) => {
                ErrorKind::Configuration
            }
            Self::StepFailed { kind, .. } => *kind,
            Self::Condition(_) => ErrorKind::ConditionEvaluationError,
            Self::Orchestration(e) => e.kind(),
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Store(_) => ErrorKind::Persistence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_abstraction::TaskCategory;

    #[test]
    fn test_step_failure_keeps_kind() {
        let err = WorkflowError::StepFailed {
            step_id: "step-2".to_string(),
            kind: ErrorKind::TaskRetriesExhausted,
            message: "boom".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::TaskRetriesExhausted);
        assert_eq!(err.to_string(), "Step 'step-2' failed (task_retries_exhausted): boom");
    }

    #[test]
    fn test_orchestration_error_conversion() {
        let err: WorkflowError =
            OrchestrationError::NoSuitableAgent(TaskCategory::Conversation).into();
        assert_eq!(err.kind(), ErrorKind::NoSuitableAgent);
    }
}
