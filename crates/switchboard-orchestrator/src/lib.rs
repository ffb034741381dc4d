//! Routing and task orchestration for Switchboard.
//!
//! Two layers live here: a health-aware [`Router`] that picks one of several
//! model backends per request, and a [`TaskOrchestrator`] that queues typed
//! tasks and dispatches them to capable agents with retry and deadlines.

pub mod agents;
pub mod capability;
pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod routing;

pub use agents::{FnAgent, ProviderAgent};
pub use capability::CapabilityMap;
pub use config::{BackendConfig, ConfigError, OrchestratorConfig, RouterConfig};
pub use executor::TaskExecutor;
pub use orchestrator::{SystemMetrics, TaskOrchestrator, score_agent};
pub use queue::TaskQueue;
pub use registry::{AgentMetadata, AgentRegistry};
pub use retry::RetryPolicy;
pub use routing::{
    BackendHealth, BalancedScorer, HealthProber, HealthRegistry, ProbeOutcome, RouteResponse,
    Router, RoutingStrategy,
};

// Re-export the error separately so downstream crates can name it unqualified
pub use error::{OrchestrationError, Result};
