//! Agent abstraction.
//!
//! Agents are capability-bearing executors. The orchestrator selects among
//! them by [`AgentCategory`] and reads their self-reported [`AgentStatus`]
//! and [`AgentMetrics`]; it never sets an agent's status itself.

use crate::provider::ProviderError;
use crate::task::{Task, TaskResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Kind of executor an agent is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentCategory {
    /// Data collection, cleaning and validation.
    Data,
    /// Model training, evaluation and deployment.
    Model,
    /// Online serving: inference, caching, balancing, monitoring.
    Service,
    /// Experiment and metric evaluation.
    Eval,
    /// General purpose LLM-backed agents.
    Conversational,
}

impl fmt::Display for AgentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentCategory::Data => write!(f, "data"),
            AgentCategory::Model => write!(f, "model"),
            AgentCategory::Service => write!(f, "service"),
            AgentCategory::Eval => write!(f, "eval"),
            AgentCategory::Conversational => write!(f, "conversational"),
        }
    }
}

impl FromStr for AgentCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "data" => Ok(AgentCategory::Data),
            "model" => Ok(AgentCategory::Model),
            "service" => Ok(AgentCategory::Service),
            "eval" | "evaluation" => Ok(AgentCategory::Eval),
            "conversational" => Ok(AgentCategory::Conversational),
            _ => Err(format!("unknown agent category '{}'", s)),
        }
    }
}

/// Self-reported agent status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Processing,
    Error,
    Maintenance,
}

impl AgentStatus {
    /// Whether the agent counts as active in system metrics.
    pub fn is_active(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Processing)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Processing => write!(f, "processing"),
            AgentStatus::Error => write!(f, "error"),
            AgentStatus::Maintenance => write!(f, "maintenance"),
        }
    }
}

/// Host resource consumption reported by an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: f64,
    pub memory_mb: f64,
}

impl ResourceUsage {
    /// Memory considered fully used when computing efficiency.
    pub const MEMORY_REFERENCE_MB: f64 = 8192.0;

    /// Efficiency in `[0, 1]`: `1 - (cpu/100 + mem/8192) / 2`, floored at 0.
    pub fn efficiency(&self) -> f64 {
        let load = (self.cpu_percent / 100.0 + self.memory_mb / Self::MEMORY_REFERENCE_MB) / 2.0;
        (1.0 - load).clamp(0.0, 1.0)
    }
}

/// Performance metrics an agent reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub tasks_processed: u64,
    /// Fraction of successful tasks in `[0, 1]`.
    pub success_rate: f64,
    pub average_latency: Duration,
    pub error_count: u64,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_usage: Option<ResourceUsage>,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            tasks_processed: 0,
            success_rate: 1.0,
            average_latency: Duration::ZERO,
            error_count: 0,
            last_active: None,
            resource_usage: None,
        }
    }
}

/// Errors raised by agents.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    /// The agent attempted the task and failed.
    #[error("Agent execution failed: {0}")]
    ExecutionFailed(String),

    /// The task payload was not understood.
    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),

    /// The agent cannot accept work right now.
    #[error("Agent unavailable: {0}")]
    Unavailable(String),

    /// The agent's health probe failed.
    #[error("Health check failed: {0}")]
    HealthCheckFailed(String),

    /// A provider call made on behalf of the task failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// A capability-bearing executor.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique agent id.
    fn id(&self) -> &str;

    /// Category used for capability matching.
    fn category(&self) -> AgentCategory;

    /// Human readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Current self-reported status.
    fn status(&self) -> AgentStatus;

    /// Processes one attempt of a task.
    async fn process(&self, task: &Task) -> Result<TaskResult, AgentError>;

    /// Probes the agent's health.
    async fn health_check(&self) -> Result<(), AgentError>;

    /// Snapshot of the agent's metrics.
    fn metrics(&self) -> AgentMetrics;
}

/// Status and metrics bookkeeping for [`Agent`] implementations.
///
/// Use [`MetricsTracker::start`] to wrap one task attempt. The returned guard
/// records a failure if it is dropped without being finished, so an attempt
/// abandoned by a timeout never leaves the agent stuck in `processing`.
#[derive(Debug, Default)]
pub struct MetricsTracker {
    status: Mutex<AgentStatus>,
    metrics: Mutex<AgentMetrics>,
}

impl MetricsTracker {
    /// Creates a tracker for an idle agent with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker seeded with existing metrics.
    pub fn with_metrics(metrics: AgentMetrics) -> Self {
        Self { status: Mutex::new(AgentStatus::Idle), metrics: Mutex::new(metrics) }
    }

    /// Current status.
    pub fn status(&self) -> AgentStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overrides the status (for example to enter maintenance).
    pub fn set_status(&self, status: AgentStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Marks the agent as processing.
    pub fn begin(&self) {
        self.set_status(AgentStatus::Processing);
    }

    /// Marks the agent as processing and returns a guard for the attempt.
    pub fn start(&self) -> Attempt<'_> {
        self.begin();
        Attempt { tracker: self, started: Instant::now(), finished: false }
    }

    /// Records the outcome of an attempt and returns the agent to idle.
    pub fn finish(&self, success: bool, latency: Duration) {
        {
            let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
            metrics.tasks_processed += 1;
            let n = metrics.tasks_processed as f64;
            let outcome = if success { 1.0 } else { 0.0 };
            metrics.success_rate = (metrics.success_rate * (n - 1.0) + outcome) / n;
            metrics.average_latency = if metrics.tasks_processed == 1 {
                latency
            } else {
                (metrics.average_latency + latency) / 2
            };
            if !success {
                metrics.error_count += 1;
            }
            metrics.last_active = Some(Utc::now());
        }

        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if *status == AgentStatus::Processing {
            *status = AgentStatus::Idle;
        }
    }

    /// Updates the reported resource usage.
    pub fn set_resource_usage(&self, usage: ResourceUsage) {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).resource_usage = Some(usage);
    }

    /// Snapshot of the metrics.
    pub fn snapshot(&self) -> AgentMetrics {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// One in-flight attempt tracked by a [`MetricsTracker`].
#[derive(Debug)]
pub struct Attempt<'a> {
    tracker: &'a MetricsTracker,
    started: Instant,
    finished: bool,
}

impl Attempt<'_> {
    /// Records the outcome of the attempt.
    pub fn finish(mut self, success: bool) {
        self.finished = true;
        self.tracker.finish(success, self.started.elapsed());
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.tracker.finish(false, self.started.elapsed());
        }
    }
}
