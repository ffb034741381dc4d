//! Single-task execution contract.

use crate::error::Result;
use async_trait::async_trait;
use switchboard_abstraction::{Task, TaskResult};
use tokio_util::sync::CancellationToken;

/// Runs one task to a terminal result.
///
/// Structural failures (no capable agent, cancelled before start) are
/// returned as errors. Failures that happen while an agent works on the task
/// come back as an unsuccessful [`TaskResult`].
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Executes `task`, giving up early when `cancel` fires.
    async fn execute(&self, task: Task, cancel: &CancellationToken) -> Result<TaskResult>;
}
