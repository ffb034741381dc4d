//! Workflow and step definitions.

use crate::condition::Condition;
use crate::config::WorkflowConfig;
use crate::context::ContextHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use switchboard_abstraction::TaskCategory;

/// What a step is meant to do. Informational, except for `Compress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    #[default]
    Process,
    Analyze,
    Generate,
    Validate,
    Summarize,
    Decision,
    /// Compresses the context instead of calling an agent.
    Compress,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Process => "process",
            Self::Analyze => "analyze",
            Self::Generate => "generate",
            Self::Validate => "validate",
            Self::Summarize => "summarize",
            Self::Decision => "decision",
            Self::Compress => "compress",
        })
    }
}

/// Status of a workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// One step of a sequential workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step id, unique within its workflow.
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
    /// Task category used to pick an agent. Falls back to the workflow default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<TaskCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Declared input passed along with the composed message.
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl WorkflowStep {
    /// Creates a pending step.
    pub fn new(id: impl Into<String>, name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            step_type,
            category: None,
            condition: None,
            input: Map::new(),
            output: None,
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            error: None,
            metadata: HashMap::new(),
        }
    }

    /// Routes the step to agents of `category`.
    #[must_use]
    pub fn with_category(mut self, category: TaskCategory) -> Self {
        self.category = Some(category);
        self
    }

    /// Only runs the step when `condition` holds.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Adds a declared input value.
    #[must_use]
    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.input.insert(key.into(), value);
        self
    }

    /// The step's response text, if it completed with one.
    pub fn response(&self) -> Option<&str> {
        self.output.as_ref()?.get("response")?.as_str()
    }

    /// Clears the outcome of a previous run.
    pub fn reset(&mut self) {
        self.output = None;
        self.status = StepStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.duration_ms = None;
        self.error = None;
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_completed(&mut self, output: Value) {
        self.output = Some(output);
        self.status = StepStatus::Completed;
        self.finish();
    }

    pub(crate) fn mark_failed(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.status = StepStatus::Failed;
        self.finish();
    }

    pub(crate) fn mark_skipped(&mut self) {
        self.status = StepStatus::Skipped;
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|started| now.signed_duration_since(started).num_milliseconds().max(0) as u64);
    }
}

/// Lifecycle of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// An ordered list of steps sharing one context.
///
/// Cloning copies the context, so a clone never writes into the original's.
#[derive(Debug, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub config: WorkflowConfig,
    #[serde(default)]
    pub context: ContextHandle,
    #[serde(default)]
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration_ms: Option<u64>,
}

impl Clone for Workflow {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            steps: self.steps.clone(),
            config: self.config.clone(),
            context: ContextHandle::new(self.context.snapshot()),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            total_duration_ms: self.total_duration_ms,
        }
    }
}

impl Workflow {
    /// Creates a draft workflow with a fresh context.
    pub fn new(name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            context: ContextHandle::for_workflow(&id),
            id,
            name: name.into(),
            description: String::new(),
            steps,
            config: WorkflowConfig::default(),
            status: WorkflowStatus::Draft,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_duration_ms: None,
        }
    }

    /// Looks up a step by id.
    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Checks that the workflow can run.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err(format!("workflow '{}' has no steps", self.name));
        }
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(format!("workflow '{}' has a step without an id", self.name));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(format!("duplicate step id '{}'", step.id));
            }
        }
        self.config.validate().map_err(|e| e.to_string())
    }
}
