//! Core abstractions for Switchboard.
//!
//! This crate defines the data model shared by the router, the task
//! orchestrator and the workflow engine, together with the two interfaces
//! the core consumes but does not implement: [`Agent`] and [`Provider`].

pub mod agent;
pub mod provider;
pub mod task;

pub use agent::{
    Agent, AgentCategory, AgentError, AgentMetrics, AgentStatus, Attempt, MetricsTracker,
    ResourceUsage,
};
pub use provider::{Provider, ProviderError, ProviderRequest, ProviderResponse};
pub use task::{
    ErrorKind, Task, TaskCategory, TaskFailure, TaskMetrics, TaskPriority, TaskResult,
};
