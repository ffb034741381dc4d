//! Stand-in providers and agents so the binary runs without network access.

use crate::config::SimulatedBackend;
use async_trait::async_trait;
use rand::Rng;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use switchboard_abstraction::{
    Agent, AgentCategory, AgentError, Provider, ProviderError, ProviderRequest, ProviderResponse,
    Task,
};
use switchboard_orchestrator::{FnAgent, ProviderAgent, Router};

/// Provider that sleeps for a jittered latency and fails at a fixed rate.
#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    name: String,
    latency: Duration,
    failure_rate: f64,
}

impl SimulatedProvider {
    pub fn new(backend: &SimulatedBackend) -> Self {
        Self {
            name: backend.name.clone(),
            latency: Duration::from_millis(backend.latency_ms),
            failure_rate: backend.failure_rate,
        }
    }
}

#[async_trait]
impl Provider for SimulatedProvider {
    async fn invoke(&self, request: &ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        // ThreadRng is not Send; draw everything before the first await.
        let (delay, fail) = {
            let mut rng = rand::thread_rng();
            let jitter = rng.gen_range(0.8..=1.2);
            (self.latency.mul_f64(jitter), rng.gen_bool(self.failure_rate))
        };
        tokio::time::sleep(delay).await;

        if fail {
            return Err(ProviderError::ResponseError(format!("{} returned a simulated error", self.name)));
        }
        let words = request.prompt.split_whitespace().count() as u32;
        let subject = match request.metadata.get("step_id") {
            Some(step) => format!("{}: {}", step, summarize_prompt(&request.prompt)),
            None => summarize_prompt(&request.prompt),
        };
        Ok(ProviderResponse {
            content: format!("[{}] {}", self.name, subject),
            tokens_used: words * 2 + 16,
            model: Some(format!("{}-sim", self.name)),
        })
    }
}

/// First line of the prompt, shortened.
fn summarize_prompt(prompt: &str) -> String {
    let line = prompt.lines().find(|l| !l.trim().is_empty()).unwrap_or_default().trim();
    if line.chars().count() > 80 {
        format!("{}...", line.chars().take(80).collect::<String>())
    } else {
        line.to_string()
    }
}

/// Registers one simulated provider per configured backend.
pub fn register_backends(router: &Router, backends: &[SimulatedBackend]) {
    for backend in backends {
        router.register_backend(&backend.backend_config(), Arc::new(SimulatedProvider::new(backend)));
    }
}

/// `replicas` agents per category. Conversational agents route through
/// `router`.
///
/// Agents take one task at a time, so concurrent submissions need as many
/// replicas as tasks in flight.
pub fn default_agents(router: &Arc<Router>, replicas: usize) -> Vec<Arc<dyn Agent>> {
    let mut agents: Vec<Arc<dyn Agent>> = Vec::new();
    for n in 1..=replicas.max(1) {
        for category in [
            AgentCategory::Data,
            AgentCategory::Model,
            AgentCategory::Service,
            AgentCategory::Eval,
        ] {
            let agent = FnAgent::new(format!("{}-agent-{}", category, n), category, move |task: Task| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, AgentError>(describe(category, &task))
            })
            .with_description(format!("Simulated {} agent", category));
            agents.push(Arc::new(agent));
        }
        agents.push(Arc::new(ProviderAgent::new(
            format!("conversational-agent-{}", n),
            Arc::clone(router),
        )));
    }
    agents
}

fn describe(category: AgentCategory, task: &Task) -> Value {
    json!({
        "response": format!("{} agent handled {} task {}", category, task.category, task.id),
        "tokens_used": 8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(failure_rate: f64) -> SimulatedBackend {
        SimulatedBackend {
            name: "sim".to_string(),
            cost_per_unit: 0.0,
            priority: 0,
            latency_ms: 1,
            failure_rate,
        }
    }

    #[tokio::test]
    async fn test_reliable_provider_answers() {
        let provider = SimulatedProvider::new(&backend(0.0));
        let response = provider.invoke(&ProviderRequest::new("hello there")).await.unwrap();
        assert_eq!(response.content, "[sim] hello there");
        assert_eq!(response.tokens_used, 20);
    }

    #[tokio::test]
    async fn test_names_the_workflow_step() {
        let provider = SimulatedProvider::new(&backend(0.0));
        let mut request = ProviderRequest::new("WORKFLOW STEP EXECUTION\nStep: Plan (step-1)");
        request.metadata.insert("step_id".to_string(), "step-1".to_string());
        let response = provider.invoke(&request).await.unwrap();
        assert_eq!(response.content, "[sim] step-1: WORKFLOW STEP EXECUTION");
    }

    #[tokio::test]
    async fn test_broken_provider_fails() {
        let provider = SimulatedProvider::new(&backend(1.0));
        let err = provider.invoke(&ProviderRequest::new("hello")).await.unwrap_err();
        assert!(matches!(err, ProviderError::ResponseError(_)));
    }

    #[test]
    fn test_default_agents_cover_every_category() {
        let router = Arc::new(Router::new(switchboard_orchestrator::RouterConfig::default()));
        let agents = default_agents(&router, 2);
        assert_eq!(agents.len(), 10);
        assert!(agents.iter().any(|a| a.category() == AgentCategory::Conversational));
        assert_eq!(agents[0].id(), "data-agent-1");
    }

    #[test]
    fn test_summarize_prompt_takes_first_line() {
        assert_eq!(summarize_prompt("\n  WORKFLOW STEP\nmore"), "WORKFLOW STEP");
        assert!(summarize_prompt(&"x".repeat(200)).ends_with("..."));
    }
}
