//! Agent registry for managing registered agents.
//!
//! Agents are kept in registration order so that selection ties resolve to
//! the earliest registered agent.

use std::fmt;
use std::sync::Arc;
use switchboard_abstraction::{Agent, AgentCategory, AgentStatus};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Metadata about a registered agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMetadata {
    /// The agent's unique ID.
    pub id: String,
    /// The agent's category.
    pub category: AgentCategory,
    /// The agent's status at listing time.
    pub status: AgentStatus,
    /// The agent's description.
    pub description: String,
}

/// Registry for managing agents.
pub struct AgentRegistry {
    agents: RwLock<Vec<Arc<dyn Agent>>>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agent_count", &self.agents.try_read().map(|a| a.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl AgentRegistry {
    /// Creates a new empty agent registry.
    #[must_use]
    pub fn new() -> Self {
        Self { agents: RwLock::new(Vec::new()) }
    }

    /// Registers an agent in the registry.
    ///
    /// # Arguments
    /// * `agent` - The agent to register
    ///
    /// # Returns
    /// Returns `true` if the agent was newly registered, `false` if it replaced an existing agent.
    /// A replaced agent keeps its position in registration order.
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) -> bool {
        let id = agent.id().to_string();

        debug!(agent_id = %id, category = %agent.category(), "Registering agent");

        let mut agents = self.agents.write().await;
        if let Some(slot) = agents.iter_mut().find(|a| a.id() == id) {
            *slot = agent;
            warn!(agent_id = %id, "Agent replaced in registry");
            false
        } else {
            agents.push(agent);
            true
        }
    }

    /// Retrieves an agent by ID.
    pub async fn get_agent(&self, id: &str) -> Option<Arc<dyn Agent>> {
        let agents = self.agents.read().await;
        agents.iter().find(|a| a.id() == id).cloned()
    }

    /// Snapshot of all agents in registration order.
    pub async fn agents(&self) -> Vec<Arc<dyn Agent>> {
        self.agents.read().await.clone()
    }

    /// Lists all registered agents with their metadata.
    pub async fn list_agents(&self) -> Vec<AgentMetadata> {
        let agents = self.agents.read().await;
        agents
            .iter()
            .map(|agent| AgentMetadata {
                id: agent.id().to_string(),
                category: agent.category(),
                status: agent.status(),
                description: agent.description().to_string(),
            })
            .collect()
    }

    /// Unregisters an agent from the registry.
    ///
    /// # Returns
    /// Returns `true` if the agent was found and removed, `false` otherwise.
    pub async fn unregister_agent(&self, id: &str) -> bool {
        debug!(agent_id = %id, "Unregistering agent");

        let mut agents = self.agents.write().await;
        let before = agents.len();
        agents.retain(|a| a.id() != id);
        let removed = agents.len() != before;

        if !removed {
            warn!(agent_id = %id, "Attempted to unregister non-existent agent");
        }

        removed
    }

    /// Returns the number of registered agents.
    pub async fn count(&self) -> usize {
        self.agents.read().await.len()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
