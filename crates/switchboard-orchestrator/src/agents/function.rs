//! Closure-backed agent.
//!
//! Wraps an async handler so that specialised workers can be registered
//! without writing an [`Agent`] implementation by hand.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use switchboard_abstraction::{
    Agent, AgentCategory, AgentError, AgentMetrics, AgentStatus, MetricsTracker, ResourceUsage,
    Task, TaskResult,
};
use tracing::debug;

/// An agent whose work is done by an async closure.
pub struct FnAgent<F> {
    id: String,
    category: AgentCategory,
    description: String,
    handler: F,
    tracker: MetricsTracker,
}

impl<F> fmt::Debug for FnAgent<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAgent")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("status", &self.tracker.status())
            .finish_non_exhaustive()
    }
}

impl<F, Fut> FnAgent<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, AgentError>> + Send + 'static,
{
    /// Creates a new agent.
    ///
    /// # Arguments
    /// * `id` - The agent ID
    /// * `category` - Category used for capability matching
    /// * `handler` - Called once per attempt with a copy of the task
    pub fn new(id: impl Into<String>, category: AgentCategory, handler: F) -> Self {
        Self {
            id: id.into(),
            category,
            description: String::new(),
            handler,
            tracker: MetricsTracker::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Seeds the agent's metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.tracker = MetricsTracker::with_metrics(metrics);
        self
    }

    /// Sets the reported resource usage.
    pub fn set_resource_usage(&self, usage: ResourceUsage) {
        self.tracker.set_resource_usage(usage);
    }

    /// Overrides the agent's status.
    pub fn set_status(&self, status: AgentStatus) {
        self.tracker.set_status(status);
    }
}

#[async_trait]
impl<F, Fut> Agent for FnAgent<F>
where
    F: Fn(Task) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, AgentError>> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> AgentCategory {
        self.category
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn status(&self) -> AgentStatus {
        self.tracker.status()
    }

    async fn process(&self, task: &Task) -> Result<TaskResult, AgentError> {
        debug!(agent_id = %self.id, task_id = %task.id, attempt = task.retry_count + 1, "FnAgent processing");

        let attempt = self.tracker.start();
        let outcome = (self.handler)(task.clone()).await;
        attempt.finish(outcome.is_ok());

        outcome.map(|data| TaskResult::success(task.id.clone(), data))
    }

    async fn health_check(&self) -> Result<(), AgentError> {
        match self.tracker.status() {
            AgentStatus::Error => Err(AgentError::HealthCheckFailed(format!(
                "agent '{}' is in error state",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    fn metrics(&self) -> AgentMetrics {
        self.tracker.snapshot()
    }
}
