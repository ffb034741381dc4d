//! Task and result types.
//!
//! A [`Task`] is the unit of work submitted to the orchestrator. Executing it
//! produces exactly one immutable [`TaskResult`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Category of work a task represents.
///
/// Categories are matched against agent categories through the capability map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    DataCollection,
    FeatureEngineering,
    DataCleaning,
    DataValidation,
    ModelTraining,
    ModelEvaluation,
    HyperparamTuning,
    ModelDeployment,
    RealtimeInference,
    CacheManagement,
    LoadBalancing,
    ServiceMonitoring,
    AbTesting,
    MetricsAnalysis,
    EffectEvaluation,
    ReportGeneration,
    /// General conversational work, used by workflow steps.
    Conversation,
}

impl TaskCategory {
    /// Every category, in declaration order.
    pub const ALL: [TaskCategory; 17] = [
        TaskCategory::DataCollection,
        TaskCategory::FeatureEngineering,
        TaskCategory::DataCleaning,
        TaskCategory::DataValidation,
        TaskCategory::ModelTraining,
        TaskCategory::ModelEvaluation,
        TaskCategory::HyperparamTuning,
        TaskCategory::ModelDeployment,
        TaskCategory::RealtimeInference,
        TaskCategory::CacheManagement,
        TaskCategory::LoadBalancing,
        TaskCategory::ServiceMonitoring,
        TaskCategory::AbTesting,
        TaskCategory::MetricsAnalysis,
        TaskCategory::EffectEvaluation,
        TaskCategory::ReportGeneration,
        TaskCategory::Conversation,
    ];

    /// Returns the snake_case wire name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::DataCollection => "data_collection",
            TaskCategory::FeatureEngineering => "feature_engineering",
            TaskCategory::DataCleaning => "data_cleaning",
            TaskCategory::DataValidation => "data_validation",
            TaskCategory::ModelTraining => "model_training",
            TaskCategory::ModelEvaluation => "model_evaluation",
            TaskCategory::HyperparamTuning => "hyperparam_tuning",
            TaskCategory::ModelDeployment => "model_deployment",
            TaskCategory::RealtimeInference => "realtime_inference",
            TaskCategory::CacheManagement => "cache_management",
            TaskCategory::LoadBalancing => "load_balancing",
            TaskCategory::ServiceMonitoring => "service_monitoring",
            TaskCategory::AbTesting => "ab_testing",
            TaskCategory::MetricsAnalysis => "metrics_analysis",
            TaskCategory::EffectEvaluation => "effect_evaluation",
            TaskCategory::ReportGeneration => "report_generation",
            TaskCategory::Conversation => "conversation",
        }
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        TaskCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| format!("unknown task category '{}'", s))
    }
}

/// Task priority. Informational only: the queue is strictly FIFO.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" | "1" => Ok(TaskPriority::Low),
            "medium" | "2" => Ok(TaskPriority::Medium),
            "high" | "3" => Ok(TaskPriority::High),
            "critical" | "4" => Ok(TaskPriority::Critical),
            _ => Err(format!("unknown task priority '{}'", s)),
        }
    }
}

/// A unit of work routed to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id. Empty ids are replaced on submission.
    #[serde(default)]
    pub id: String,
    /// What kind of work this is.
    pub category: TaskCategory,
    /// Informational priority.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Opaque payload handed to the agent.
    #[serde(default)]
    pub payload: Value,
    /// Free-form string tags (for example the originating workflow step).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// Absolute deadline. When unset the orchestrator applies its task timeout.
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    /// Number of failed attempts so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Retry budget. When unset the orchestrator fills in its policy default.
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Task {
    /// Creates a new task with a fresh id.
    pub fn new(category: TaskCategory, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            priority: TaskPriority::default(),
            payload,
            metadata: HashMap::new(),
            created_at: Utc::now(),
            deadline: None,
            retry_count: 0,
            max_retries: None,
        }
    }

    /// Sets the task id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the task priority.
    #[must_use]
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline relative to now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        self.deadline = Utc::now().checked_add_signed(timeout);
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Adds a metadata tag.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Time left until the deadline, if one is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}

/// Machine-readable failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoBackendsAvailable,
    BackendNotFound,
    ProviderError,
    NoSuitableAgent,
    QueueFull,
    ShuttingDown,
    TaskTimeout,
    TaskRetriesExhausted,
    AgentExecutionError,
    ConditionEvaluationError,
    Cancelled,
    Configuration,
    NotFound,
    Persistence,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NoBackendsAvailable => "no_backends_available",
            ErrorKind::BackendNotFound => "backend_not_found",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::NoSuitableAgent => "no_suitable_agent",
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::ShuttingDown => "shutting_down",
            ErrorKind::TaskTimeout => "task_timeout",
            ErrorKind::TaskRetriesExhausted => "task_retries_exhausted",
            ErrorKind::AgentExecutionError => "agent_execution_error",
            ErrorKind::ConditionEvaluationError => "condition_evaluation_error",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// Error attached to an unsuccessful [`TaskResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Execution measurements for a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// Wall-clock time across all attempts.
    pub execution_time: Duration,
    /// Agent-reported quality in `[0, 1]`; 0 when unknown.
    pub quality_score: f64,
    /// Number of `process` calls made.
    pub attempts: u32,
}

/// Outcome of executing a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskFailure>,
    #[serde(default)]
    pub metrics: TaskMetrics,
    pub created_at: DateTime<Utc>,
}

impl TaskResult {
    /// Builds a successful result.
    pub fn success(task_id: impl Into<String>, data: Value) -> Self {
        Self {
            task_id: task_id.into(),
            success: true,
            data: Some(data),
            error: None,
            metrics: TaskMetrics::default(),
            created_at: Utc::now(),
        }
    }

    /// Builds a failed result carrying an error kind and message.
    pub fn failure(task_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            data: None,
            error: Some(TaskFailure { kind, message: message.into() }),
            metrics: TaskMetrics::default(),
            created_at: Utc::now(),
        }
    }

    /// Replaces the metrics block.
    #[must_use]
    pub fn with_metrics(mut self, metrics: TaskMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Returns the failure kind, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in TaskCategory::ALL {
            let parsed: TaskCategory = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert_eq!("Model-Training".parse::<TaskCategory>().unwrap(), TaskCategory::ModelTraining);
        assert!("juggling".parse::<TaskCategory>().is_err());
    }

    #[test]
    fn test_task_deserializes_with_defaults() {
        let task: Task = serde_json::from_value(json!({ "category": "data_cleaning" })).unwrap();
        assert!(task.id.is_empty());
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.max_retries, None);
        assert_eq!(task.retry_count, 0);
        assert!(task.deadline.is_none());
    }

    #[test]
    fn test_task_builder() {
        let task = Task::new(TaskCategory::ReportGeneration, json!({"x": 1}))
            .with_id("t-1")
            .with_priority(TaskPriority::Critical)
            .with_max_retries(0)
            .with_metadata("step_id", "step_1");

        assert_eq!(task.id, "t-1");
        assert_eq!(task.priority, TaskPriority::Critical);
        assert_eq!(task.max_retries, Some(0));
        assert_eq!(task.metadata.get("step_id").map(String::as_str), Some("step_1"));
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        let task = Task::new(TaskCategory::Conversation, Value::Null)
            .with_deadline(Utc::now() - chrono::Duration::seconds(5));
        assert_eq!(task.remaining(), Some(Duration::ZERO));

        let task = task.with_timeout(Duration::from_secs(60));
        assert!(task.remaining().unwrap() > Duration::from_secs(50));
    }

    #[test]
    fn test_failure_result_carries_kind() {
        let result = TaskResult::failure("t-1", ErrorKind::TaskTimeout, "deadline exceeded");
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::TaskTimeout));
        assert_eq!(result.error.unwrap().to_string(), "task_timeout: deadline exceeded");
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let value = serde_json::to_value(ErrorKind::TaskRetriesExhausted).unwrap();
        assert_eq!(value, json!("task_retries_exhausted"));
    }
}
