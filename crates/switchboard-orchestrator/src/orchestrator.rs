//! Task orchestrator.
//!
//! Accepts typed tasks on a bounded queue, dispatches each one to the best
//! idle agent able to handle its category, and drives the attempt loop:
//! deadline, retry with backoff, terminal result. A fixed pool of workers
//! drains the queue and publishes results on a bounded channel.

use crate::capability::CapabilityMap;
use crate::config::OrchestratorConfig;
use crate::error::{OrchestrationError, Result};
use crate::executor::TaskExecutor;
use crate::queue::TaskQueue;
use crate::registry::AgentRegistry;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use switchboard_abstraction::{
    Agent, AgentMetrics, AgentStatus, ErrorKind, Task, TaskCategory, TaskMetrics, TaskResult,
};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const SUCCESS_WEIGHT: f64 = 0.6;
const LATENCY_WEIGHT: f64 = 0.25;
const EFFICIENCY_WEIGHT: f64 = 0.15;

/// Latency at which the latency term of an agent's score reaches zero.
const LATENCY_HORIZON_SECS: f64 = 60.0;

/// Scores an agent for dispatch. Higher is better.
///
/// `0.6 * success_rate + 0.25 * max(0, 1 - latency_s / 60) + 0.15 * efficiency`,
/// where efficiency is 0 when the agent reports no resource usage.
pub fn score_agent(metrics: &AgentMetrics) -> f64 {
    let latency = (1.0 - metrics.average_latency.as_secs_f64() / LATENCY_HORIZON_SECS).max(0.0);
    let efficiency = metrics.resource_usage.map_or(0.0, |usage| usage.efficiency());
    SUCCESS_WEIGHT * metrics.success_rate + LATENCY_WEIGHT * latency + EFFICIENCY_WEIGHT * efficiency
}

/// Aggregate orchestrator state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub total_agents: usize,
    /// Agents not in error or maintenance.
    pub active_agents: usize,
    pub processing_agents: usize,
    pub queued_tasks: usize,
    pub queue_capacity: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
}

struct Shared {
    config: OrchestratorConfig,
    registry: AgentRegistry,
    capabilities: CapabilityMap,
    queue: TaskQueue,
    results: mpsc::Sender<TaskResult>,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Dispatches tasks to agents.
pub struct TaskOrchestrator {
    shared: Arc<Shared>,
    results: Mutex<Option<mpsc::Receiver<TaskResult>>>,
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl fmt::Debug for TaskOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskOrchestrator")
            .field("config", &self.shared.config)
            .field("queue", &self.shared.queue)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl TaskOrchestrator {
    /// Creates an orchestrator from validated configuration.
    ///
    /// Workers are not started until [`TaskOrchestrator::start`] is called.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        let capabilities = CapabilityMap::with_overrides(&config.capabilities)?;
        Ok(Self::with_capabilities(config, capabilities))
    }

    /// Creates an orchestrator with an explicit capability map.
    pub fn with_capabilities(config: OrchestratorConfig, capabilities: CapabilityMap) -> Self {
        let queue = TaskQueue::new(config.queue_capacity());
        let (results_tx, results_rx) = mpsc::channel(config.result_buffer.max(1));
        let shared = Shared {
            config,
            registry: AgentRegistry::new(),
            capabilities,
            queue,
            results: results_tx,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        };

        Self {
            shared: Arc::new(shared),
            results: Mutex::new(Some(results_rx)),
            shutdown: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Orchestrator settings.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.shared.config
    }

    /// The agent registry.
    pub fn registry(&self) -> &AgentRegistry {
        &self.shared.registry
    }

    /// Registers an agent.
    ///
    /// # Returns
    /// Returns `true` if the agent was newly registered, `false` if it replaced an existing agent.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> bool {
        self.shared.registry.register_agent(agent).await
    }

    /// Starts the worker pool and the background routines.
    ///
    /// Must be called from within a Tokio runtime. Calling it again while
    /// running is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(OrchestrationError::ShuttingDown);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Task orchestrator already running");
            return Ok(());
        }

        let workers = self.shared.config.max_concurrent_tasks;
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for worker_id in 0..workers {
            handles.push(tokio::spawn(worker_loop(
                Arc::clone(&self.shared),
                worker_id,
                self.shutdown.clone(),
            )));
        }
        handles.push(tokio::spawn(health_check_loop(Arc::clone(&self.shared), self.shutdown.clone())));
        handles.push(tokio::spawn(metrics_loop(Arc::clone(&self.shared), self.shutdown.clone())));

        info!(workers, queue_capacity = self.shared.queue.capacity(), "Task orchestrator started");
        Ok(())
    }

    /// Whether the workers are running.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }

    /// Enqueues a task without blocking.
    ///
    /// Assigns an id if the task has none and fills in the default retry
    /// budget.
    ///
    /// # Returns
    /// The task id, `QueueFull` if the queue is saturated, or `ShuttingDown`
    /// once shutdown has begun.
    pub fn submit_task(&self, mut task: Task) -> Result<String> {
        if self.shutdown.is_cancelled() {
            return Err(OrchestrationError::ShuttingDown);
        }
        if task.id.is_empty() {
            task.id = uuid::Uuid::new_v4().to_string();
        }
        task.max_retries.get_or_insert(self.shared.config.retry.max_retries);

        let id = task.id.clone();
        let category = task.category;
        match self.shared.queue.enqueue(task) {
            Ok(()) => {
                debug!(task_id = %id, category = %category, "Task submitted");
                Ok(id)
            }
            Err(e) => {
                warn!(task_id = %id, category = %category, error = %e, "Task rejected");
                Err(e)
            }
        }
    }

    /// Runs one task to completion on the caller's task.
    pub async fn process_task(&self, task: Task) -> Result<TaskResult> {
        self.shared.execute(task, Stop::new(&self.shutdown)).await
    }

    /// Runs one task, giving up when either `token` or shutdown fires.
    pub async fn process_task_with_token(
        &self,
        task: Task,
        token: &CancellationToken,
    ) -> Result<TaskResult> {
        self.shared.execute(task, Stop::new(&self.shutdown).or(token)).await
    }

    /// Takes the receiving end of the result channel.
    ///
    /// Only the first call returns `Some`. Results that do not fit in the
    /// channel are dropped with a warning.
    pub fn take_results(&self) -> Option<mpsc::Receiver<TaskResult>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Runs every agent's health check once.
    ///
    /// # Returns
    /// `(agent_id, healthy)` pairs in registration order.
    pub async fn check_agent_health(&self) -> Vec<(String, bool)> {
        self.shared.check_agents().await
    }

    /// Current aggregate metrics.
    pub async fn system_metrics(&self) -> SystemMetrics {
        self.shared.system_metrics().await
    }

    /// Stops accepting tasks, cancels the workers and waits for them.
    ///
    /// Tasks still queued are dropped. In-flight tasks finish with a
    /// cancelled result.
    pub async fn shutdown(&self) {
        let abandoned = self.shared.queue.depth();
        self.shared.queue.close();
        self.shutdown.cancel();

        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        if abandoned > 0 {
            warn!(abandoned, "Queued tasks dropped at shutdown");
        }
        info!(
            completed = self.shared.completed.load(Ordering::Relaxed),
            failed = self.shared.failed.load(Ordering::Relaxed),
            "Task orchestrator stopped"
        );
    }

    /// Shuts down, giving up on stragglers after `limit`.
    pub async fn shutdown_within(&self, limit: Duration) -> Result<()> {
        tokio::time::timeout(limit, self.shutdown())
            .await
            .map_err(|_| OrchestrationError::ShutdownTimeout(limit))
    }
}

impl Drop for TaskOrchestrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl TaskExecutor for TaskOrchestrator {
    async fn execute(&self, task: Task, cancel: &CancellationToken) -> Result<TaskResult> {
        self.process_task_with_token(task, cancel).await
    }
}

/// Cancellation sources observed by one run: orchestrator shutdown plus an
/// optional caller token.
#[derive(Clone, Copy)]
struct Stop<'a> {
    shutdown: &'a CancellationToken,
    caller: Option<&'a CancellationToken>,
}

impl<'a> Stop<'a> {
    fn new(shutdown: &'a CancellationToken) -> Self {
        Self { shutdown, caller: None }
    }

    fn or(self, caller: &'a CancellationToken) -> Self {
        Self { caller: Some(caller), ..self }
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled() || self.caller.is_some_and(CancellationToken::is_cancelled)
    }

    async fn cancelled(&self) {
        match self.caller {
            Some(caller) => tokio::select! {
                () = self.shutdown.cancelled() => {}
                () = caller.cancelled() => {}
            },
            None => self.shutdown.cancelled().await,
        }
    }
}

impl Shared {
    async fn execute(&self, task: Task, cancel: Stop<'_>) -> Result<TaskResult> {
        let outcome = self.run(task, cancel).await;
        match &outcome {
            Ok(result) if result.success => self.completed.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        outcome
    }

    async fn run(&self, mut task: Task, cancel: Stop<'_>) -> Result<TaskResult> {
        if cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        if task.id.is_empty() {
            task.id = uuid::Uuid::new_v4().to_string();
        }
        let max_retries = *task.max_retries.get_or_insert(self.config.retry.max_retries);
        let agent = self.select_agent(task.category).await?;

        let budget = match task.remaining() {
            Some(remaining) => remaining,
            None => {
                let timeout = chrono::Duration::from_std(self.config.task_timeout)
                    .unwrap_or(chrono::Duration::MAX);
                task.deadline = Utc::now().checked_add_signed(timeout);
                self.config.task_timeout
            }
        };
        let started = Instant::now();
        let deadline = started.checked_add(budget).unwrap_or_else(far_future);

        info!(
            task_id = %task.id,
            agent_id = %agent.id(),
            category = %task.category,
            max_retries,
            "Dispatching task"
        );

        let mut attempts = 0u32;
        loop {
            if Instant::now() >= deadline {
                return Ok(timed_out(&task, agent.id(), attempts, started));
            }
            attempts += 1;

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Ok(cancelled(&task, attempts, started));
                }
                outcome = tokio::time::timeout_at(deadline, agent.process(&task)) => outcome,
            };

            let failure = match outcome {
                Ok(Ok(mut result)) if result.success => {
                    result.task_id.clone_from(&task.id);
                    result.metrics.attempts = attempts;
                    result.metrics.execution_time = started.elapsed();
                    info!(
                        task_id = %task.id,
                        agent_id = %agent.id(),
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Task completed"
                    );
                    return Ok(result);
                }
                Ok(Ok(result)) => result
                    .error
                    .map_or_else(|| "agent reported failure".to_string(), |e| e.message),
                Ok(Err(e)) => e.to_string(),
                Err(_) => return Ok(timed_out(&task, agent.id(), attempts, started)),
            };

            task.retry_count += 1;
            if task.retry_count > max_retries {
                error!(
                    task_id = %task.id,
                    agent_id = %agent.id(),
                    attempts,
                    error = %failure,
                    "Task failed, retries exhausted"
                );
                return Ok(terminal(
                    &task,
                    ErrorKind::TaskRetriesExhausted,
                    format!("failed after {} attempts: {}", attempts, failure),
                    attempts,
                    started,
                ));
            }

            let delay = self.config.retry.delay(task.retry_count);
            warn!(
                task_id = %task.id,
                agent_id = %agent.id(),
                attempt = attempts,
                retry_in_ms = delay.as_millis() as u64,
                error = %failure,
                "Task attempt failed, retrying"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(cancelled(&task, attempts, started)),
                () = tokio::time::sleep_until(deadline) => {
                    return Ok(timed_out(&task, agent.id(), attempts, started));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn select_agent(&self, category: TaskCategory) -> Result<Arc<dyn Agent>> {
        let capable = self.capabilities.capable(category);
        let mut best: Option<(f64, Arc<dyn Agent>)> = None;

        for agent in self.registry.agents().await {
            if !capable.contains(&agent.category()) || agent.status() != AgentStatus::Idle {
                continue;
            }
            let score = score_agent(&agent.metrics());
            if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
                best = Some((score, agent));
            }
        }

        match best {
            Some((score, agent)) => {
                debug!(category = %category, agent_id = %agent.id(), score, "Selected agent");
                Ok(agent)
            }
            None => {
                warn!(category = %category, "No suitable agent");
                Err(OrchestrationError::NoSuitableAgent(category))
            }
        }
    }

    fn publish(&self, result: TaskResult) {
        match self.results.try_send(result) {
            Ok(()) => {}
            Err(TrySendError::Full(result)) => {
                warn!(task_id = %result.task_id, "Result channel full, dropping result");
            }
            Err(TrySendError::Closed(result)) => {
                debug!(task_id = %result.task_id, "Result receiver dropped");
            }
        }
    }

    async fn check_agents(&self) -> Vec<(String, bool)> {
        let timeout = self.config.health_check_interval;
        let mut report = Vec::new();
        for agent in self.registry.agents().await {
            let healthy = match tokio::time::timeout(timeout, agent.health_check()).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    warn!(agent_id = %agent.id(), error = %e, "Agent health check failed");
                    false
                }
                Err(_) => {
                    warn!(agent_id = %agent.id(), "Agent health check timed out");
                    false
                }
            };
            report.push((agent.id().to_string(), healthy));
        }
        report
    }

    async fn system_metrics(&self) -> SystemMetrics {
        let statuses: Vec<AgentStatus> =
            self.registry.agents().await.iter().map(|agent| agent.status()).collect();

        SystemMetrics {
            total_agents: statuses.len(),
            active_agents: statuses.iter().filter(|s| s.is_active()).count(),
            processing_agents: statuses.iter().filter(|s| **s == AgentStatus::Processing).count(),
            queued_tasks: self.queue.depth(),
            queue_capacity: self.queue.capacity(),
            completed_tasks: self.completed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
        }
    }
}

fn terminal(
    task: &Task,
    kind: ErrorKind,
    message: String,
    attempts: u32,
    started: Instant,
) -> TaskResult {
    TaskResult::failure(task.id.clone(), kind, message).with_metrics(TaskMetrics {
        execution_time: started.elapsed(),
        quality_score: 0.0,
        attempts,
    })
}

fn timed_out(task: &Task, agent_id: &str, attempts: u32, started: Instant) -> TaskResult {
    error!(task_id = %task.id, agent_id = %agent_id, attempts, "Task deadline exceeded");
    terminal(
        task,
        ErrorKind::TaskTimeout,
        format!("deadline exceeded after {} attempts", attempts),
        attempts,
        started,
    )
}

fn cancelled(task: &Task, attempts: u32, started: Instant) -> TaskResult {
    info!(task_id = %task.id, attempts, "Task cancelled");
    terminal(task, ErrorKind::Cancelled, "task cancelled".to_string(), attempts, started)
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

async fn worker_loop(shared: Arc<Shared>, worker_id: usize, token: CancellationToken) {
    debug!(worker_id, "Worker started");
    loop {
        let task = tokio::select! {
            () = token.cancelled() => break,
            task = shared.queue.dequeue() => match task {
                Some(task) => task,
                None => break,
            },
        };

        let task_id = task.id.clone();
        let result = match shared.execute(task, Stop::new(&token)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(worker_id, task_id = %task_id, error = %e, "Task could not be dispatched");
                TaskResult::failure(task_id, e.kind(), e.to_string())
            }
        };
        shared.publish(result);
    }
    debug!(worker_id, "Worker stopped");
}

async fn health_check_loop(shared: Arc<Shared>, token: CancellationToken) {
    let period = shared.config.health_check_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let report = shared.check_agents().await;
                let unhealthy = report.iter().filter(|(_, healthy)| !healthy).count();
                debug!(agents = report.len(), unhealthy, "Agent health check finished");
            }
        }
    }
}

async fn metrics_loop(shared: Arc<Shared>, token: CancellationToken) {
    let period = shared.config.metrics_interval;
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let metrics = shared.system_metrics().await;
                info!(
                    total_agents = metrics.total_agents,
                    active_agents = metrics.active_agents,
                    processing_agents = metrics.processing_agents,
                    queued_tasks = metrics.queued_tasks,
                    completed_tasks = metrics.completed_tasks,
                    failed_tasks = metrics.failed_tasks,
                    "System metrics"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_abstraction::ResourceUsage;

    #[test]
    fn test_score_agent_formula() {
        let fresh = AgentMetrics::default();
        assert!((score_agent(&fresh) - (0.6 + 0.25)).abs() < 1e-9);

        let metrics = AgentMetrics {
            success_rate: 0.5,
            average_latency: Duration::from_secs(30),
            resource_usage: Some(ResourceUsage { cpu_percent: 50.0, memory_mb: 4096.0 }),
            ..AgentMetrics::default()
        };
        let expected = 0.6 * 0.5 + 0.25 * 0.5 + 0.15 * 0.5;
        assert!((score_agent(&metrics) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_score_agent_latency_floor() {
        let slow = AgentMetrics {
            success_rate: 1.0,
            average_latency: Duration::from_secs(600),
            ..AgentMetrics::default()
        };
        assert!((score_agent(&slow) - 0.6).abs() < 1e-9);
    }
}
