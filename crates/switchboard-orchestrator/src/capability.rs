//! Static mapping from task categories to the agent categories that can
//! handle them.

use crate::config::ConfigError;
use std::collections::HashMap;
use switchboard_abstraction::{AgentCategory, TaskCategory};

/// Maps each [`TaskCategory`] to the set of capable [`AgentCategory`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityMap {
    entries: HashMap<TaskCategory, Vec<AgentCategory>>,
}

impl Default for CapabilityMap {
    fn default() -> Self {
        use TaskCategory as T;

        let mut entries = HashMap::new();
        for category in [T::DataCollection, T::FeatureEngineering, T::DataCleaning, T::DataValidation]
        {
            entries.insert(category, vec![AgentCategory::Data]);
        }
        for category in
            [T::ModelTraining, T::ModelEvaluation, T::HyperparamTuning, T::ModelDeployment]
        {
            entries.insert(category, vec![AgentCategory::Model]);
        }
        for category in
            [T::RealtimeInference, T::CacheManagement, T::LoadBalancing, T::ServiceMonitoring]
        {
            entries.insert(category, vec![AgentCategory::Service]);
        }
        for category in [T::AbTesting, T::MetricsAnalysis, T::EffectEvaluation, T::ReportGeneration]
        {
            entries.insert(category, vec![AgentCategory::Eval]);
        }
        entries.insert(T::Conversation, vec![AgentCategory::Conversational]);

        Self { entries }
    }
}

impl CapabilityMap {
    /// Creates an empty map. Every lookup yields no capable agents.
    pub fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Builds the default map with configured overrides applied.
    ///
    /// Keys are task category names, values are agent category names.
    pub fn with_overrides(overrides: &HashMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut map = Self::default();
        for (task, agents) in overrides {
            let task: TaskCategory = task.parse().map_err(ConfigError::Validation)?;
            let agents = agents
                .iter()
                .map(|a| a.parse::<AgentCategory>().map_err(ConfigError::Validation))
                .collect::<Result<Vec<_>, _>>()?;
            map.set(task, agents);
        }
        Ok(map)
    }

    /// Replaces the capable agent categories for a task category.
    pub fn set(&mut self, task: TaskCategory, agents: Vec<AgentCategory>) {
        self.entries.insert(task, agents);
    }

    /// Agent categories able to handle a task category.
    pub fn capable(&self, task: TaskCategory) -> &[AgentCategory] {
        self.entries.get(&task).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether an agent category can handle a task category.
    pub fn can_handle(&self, task: TaskCategory, agent: AgentCategory) -> bool {
        self.capable(task).contains(&agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_covers_every_category() {
        let map = CapabilityMap::default();
        for category in TaskCategory::ALL {
            assert!(!map.capable(category).is_empty(), "{category} has no agents");
        }
    }

    #[test]
    fn test_default_groups() {
        let map = CapabilityMap::default();
        assert!(map.can_handle(TaskCategory::FeatureEngineering, AgentCategory::Data));
        assert!(map.can_handle(TaskCategory::HyperparamTuning, AgentCategory::Model));
        assert!(map.can_handle(TaskCategory::CacheManagement, AgentCategory::Service));
        assert!(map.can_handle(TaskCategory::AbTesting, AgentCategory::Eval));
        assert!(map.can_handle(TaskCategory::Conversation, AgentCategory::Conversational));
        assert!(!map.can_handle(TaskCategory::DataCleaning, AgentCategory::Model));
    }

    #[test]
    fn test_overrides() {
        let overrides = HashMap::from([(
            "report_generation".to_string(),
            vec!["eval".to_string(), "conversational".to_string()],
        )]);
        let map = CapabilityMap::with_overrides(&overrides).unwrap();
        assert_eq!(
            map.capable(TaskCategory::ReportGeneration),
            &[AgentCategory::Eval, AgentCategory::Conversational]
        );
        assert!(map.can_handle(TaskCategory::DataCleaning, AgentCategory::Data));
    }

    #[test]
    fn test_invalid_override() {
        let overrides = HashMap::from([("teleport".to_string(), vec!["data".to_string()])]);
        assert!(matches!(
            CapabilityMap::with_overrides(&overrides),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_map() {
        assert!(CapabilityMap::empty().capable(TaskCategory::DataCleaning).is_empty());
    }
}
