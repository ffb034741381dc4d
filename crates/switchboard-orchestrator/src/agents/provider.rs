//! Conversational agent backed by the router.
//!
//! Each task is turned into a provider request and routed to one of the
//! healthy backends, so conversational work inherits the router's strategy
//! and health tracking.

use crate::error::OrchestrationError;
use crate::routing::{Router, RoutingStrategy};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use switchboard_abstraction::{
    Agent, AgentCategory, AgentError, AgentMetrics, AgentStatus, MetricsTracker, ProviderRequest,
    Task, TaskMetrics, TaskResult,
};
use tracing::{debug, error};

/// Agent that answers tasks by routing a prompt through a [`Router`].
#[derive(Debug)]
pub struct ProviderAgent {
    id: String,
    description: String,
    router: Arc<Router>,
    strategy: Option<RoutingStrategy>,
    eligible: Vec<String>,
    max_tokens: Option<u32>,
    tracker: MetricsTracker,
}

impl ProviderAgent {
    /// Creates a conversational agent over all backends of `router`.
    pub fn new(id: impl Into<String>, router: Arc<Router>) -> Self {
        Self {
            id: id.into(),
            description: "Routes prompts to healthy model backends".to_string(),
            router,
            strategy: None,
            eligible: Vec::new(),
            max_tokens: None,
            tracker: MetricsTracker::new(),
        }
    }

    /// Uses a fixed strategy instead of the router default.
    #[must_use]
    pub fn with_strategy(mut self, strategy: RoutingStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Restricts routing to the given backends.
    #[must_use]
    pub fn with_backends(mut self, backends: Vec<String>) -> Self {
        self.eligible = backends;
        self
    }

    /// Caps generated tokens per request.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Puts the agent in or out of maintenance.
    pub fn set_status(&self, status: AgentStatus) {
        self.tracker.set_status(status);
    }

    /// Extracts the prompt from a task payload.
    ///
    /// Accepts a bare string, or an object with a `message` or `prompt`
    /// field; anything else is sent as its JSON text.
    pub fn prompt_from(payload: &Value) -> String {
        match payload {
            Value::String(text) => text.clone(),
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("prompt"))
                .and_then(Value::as_str)
                .map_or_else(|| payload.to_string(), str::to_string),
            _ => payload.to_string(),
        }
    }
}

#[async_trait]
impl Agent for ProviderAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> AgentCategory {
        AgentCategory::Conversational
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn status(&self) -> AgentStatus {
        self.tracker.status()
    }

    async fn process(&self, task: &Task) -> Result<TaskResult, AgentError> {
        let mut request = ProviderRequest::new(Self::prompt_from(&task.payload));
        request.max_tokens = self.max_tokens;
        request.metadata.clone_from(&task.metadata);
        request.metadata.insert("task_id".to_string(), task.id.clone());

        let attempt = self.tracker.start();
        let routed = self.router.route_among(&self.eligible, &request, self.strategy, None).await;
        attempt.finish(routed.is_ok());

        match routed {
            Ok(routed) => {
                debug!(
                    agent_id = %self.id,
                    task_id = %task.id,
                    backend = %routed.backend,
                    tokens = routed.response.tokens_used,
                    "Prompt answered"
                );
                let data = json!({
                    "content": routed.response.content,
                    "backend": routed.backend,
                    "tokens_used": routed.response.tokens_used,
                    "cost": routed.cost,
                    "latency_ms": routed.latency.as_millis() as u64,
                });
                Ok(TaskResult::success(task.id.clone(), data)
                    .with_metrics(TaskMetrics { execution_time: routed.latency, ..TaskMetrics::default() }))
            }
            Err(OrchestrationError::Provider { backend, source }) => {
                error!(agent_id = %self.id, task_id = %task.id, backend = %backend, error = %source, "Backend call failed");
                Err(AgentError::Provider(source))
            }
            Err(e) => Err(AgentError::Unavailable(e.to_string())),
        }
    }

    async fn health_check(&self) -> Result<(), AgentError> {
        let report = self.router.health_report();
        let any_available = report
            .iter()
            .filter(|(name, _)| self.eligible.is_empty() || self.eligible.contains(name))
            .any(|(_, health)| health.available);

        if any_available {
            Ok(())
        } else {
            Err(AgentError::HealthCheckFailed("no backend available".to_string()))
        }
    }

    fn metrics(&self) -> AgentMetrics {
        self.tracker.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use std::time::Duration;
    use switchboard_abstraction::{Provider, ProviderError, ProviderResponse, TaskCategory};

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                content: request.prompt.to_uppercase(),
                tokens_used: 10,
                model: Some("echo-1".to_string()),
            })
        }
    }

    struct Down;

    #[async_trait]
    impl Provider for Down {
        async fn invoke(&self, _request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::Unavailable("maintenance window".to_string()))
        }
    }

    #[test]
    fn test_prompt_extraction() {
        assert_eq!(ProviderAgent::prompt_from(&json!("hi")), "hi");
        assert_eq!(ProviderAgent::prompt_from(&json!({"message": "m", "prompt": "p"})), "m");
        assert_eq!(ProviderAgent::prompt_from(&json!({"prompt": "p"})), "p");
        assert_eq!(ProviderAgent::prompt_from(&json!(42)), "42");
    }

    #[tokio::test]
    async fn test_process_routes_prompt() {
        let router = Arc::new(Router::default());
        router.register_backend(&BackendConfig::new("echo", 1.0, 1), Arc::new(Echo));
        let agent = ProviderAgent::new("chat", Arc::clone(&router));

        let task = Task::new(TaskCategory::Conversation, json!({"message": "hello"}));
        let result = agent.process(&task).await.unwrap();

        let data = result.data.unwrap();
        assert_eq!(data["content"], "HELLO");
        assert_eq!(data["backend"], "echo");
        assert_eq!(data["tokens_used"], 10);
        assert_eq!(agent.metrics().tasks_processed, 1);
        assert_eq!(router.health("echo").unwrap().request_count, 1);
    }

    #[tokio::test]
    async fn test_process_surfaces_provider_error() {
        let router = Arc::new(Router::default());
        router.register_backend(&BackendConfig::new("down", 1.0, 1), Arc::new(Down));
        let agent = ProviderAgent::new("chat", router);

        let task = Task::new(TaskCategory::Conversation, json!("hello"));
        let err = agent.process(&task).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(ProviderError::Unavailable(_))));
        assert_eq!(agent.status(), AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_health_check_follows_backends() {
        let router = Arc::new(Router::default());
        router.register_backend(&BackendConfig::new("echo", 1.0, 1), Arc::new(Echo));
        let agent = ProviderAgent::new("chat", Arc::clone(&router));
        assert!(agent.health_check().await.is_ok());

        for _ in 0..5 {
            router.record_outcome("echo", false, Duration::from_millis(1)).unwrap();
        }
        assert!(agent.health_check().await.is_err());
    }
}
