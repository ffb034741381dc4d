//! Shared workflow context.
//!
//! A [`WorkflowContext`] accumulates everything a workflow has said, decided
//! and produced. Steps read it to compose their messages and append to it
//! once they finish. [`ContextHandle`] is the shared, lock-protected form
//! used while a workflow runs.

use crate::workflow::{StepStatus, WorkflowStep};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Kind of conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    StepStart,
    StepComplete,
    StepFailed,
    Note,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StepStart => "step_start",
            Self::StepComplete => "step_complete",
            Self::StepFailed => "step_failed",
            Self::Note => "note",
        })
    }
}

/// One interaction recorded during a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub step_id: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ConversationEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(step_id: impl Into<String>, kind: EntryKind, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            step_id: step_id.into(),
            kind,
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attaches a metadata value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// How much a decision matters. Ordered from least to most important.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DecisionImpact {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl DecisionImpact {
    /// High and critical decisions survive compression.
    pub fn is_critical(self) -> bool {
        self >= Self::High
    }
}

impl fmt::Display for DecisionImpact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// An important decision made during a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyDecision {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub step_id: String,
    pub decision: String,
    pub reasoning: String,
    pub impact: DecisionImpact,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl KeyDecision {
    /// Creates a decision with a fresh id.
    pub fn new(
        step_id: impl Into<String>,
        decision: impl Into<String>,
        reasoning: impl Into<String>,
        impact: DecisionImpact,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            step_id: step_id.into(),
            decision: decision.into(),
            reasoning: reasoning.into(),
            impact,
            alternatives: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

/// Summary left behind by compression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedContext {
    pub summary: String,
    /// At most ten points.
    pub key_points: Vec<String>,
    /// Decisions with high or critical impact.
    pub critical_decisions: Vec<KeyDecision>,
    /// Shared state at compression time.
    #[serde(default)]
    pub project_state: HashMap<String, Value>,
    /// Serialized size after compression over size before.
    pub compression_ratio: f64,
    pub compressed_at: DateTime<Utc>,
}

/// State shared by the steps of one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    pub workflow_id: String,
    #[serde(default)]
    pub conversation_log: Vec<ConversationEntry>,
    #[serde(default)]
    pub key_decisions: Vec<KeyDecision>,
    #[serde(default)]
    pub shared_state: HashMap<String, Value>,
    #[serde(default)]
    pub step_results: HashMap<String, WorkflowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_info: Option<CompressedContext>,
    #[serde(default)]
    pub tokens_used: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl WorkflowContext {
    /// Creates an empty context for `workflow_id`.
    pub fn new(workflow_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: String::new(),
            workflow_id: workflow_id.into(),
            conversation_log: Vec::new(),
            key_decisions: Vec::new(),
            shared_state: HashMap::new(),
            step_results: HashMap::new(),
            compressed_info: None,
            tokens_used: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Binds the context to a session.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn add_entry(&mut self, entry: ConversationEntry) {
        self.conversation_log.push(entry);
        self.touch();
    }

    pub fn add_decision(&mut self, decision: KeyDecision) {
        self.key_decisions.push(decision);
        self.touch();
    }

    /// Sets a shared-state value. Last write wins.
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.shared_state.insert(key.into(), value);
        self.touch();
    }

    pub fn state(&self, key: &str) -> Option<&Value> {
        self.shared_state.get(key)
    }

    /// Adds to the token counter, which never decreases.
    pub fn add_tokens(&mut self, tokens: u64) {
        self.tokens_used = self.tokens_used.saturating_add(tokens);
        self.touch();
    }

    /// Stores the outcome of a step under its id.
    pub fn record_step(&mut self, step: WorkflowStep) {
        self.step_results.insert(step.id.clone(), step);
        self.touch();
    }

    /// Completed steps ordered by start time.
    pub fn completed_steps(&self) -> Vec<&WorkflowStep> {
        let mut steps: Vec<&WorkflowStep> = self
            .step_results
            .values()
            .filter(|step| step.status == StepStatus::Completed)
            .collect();
        steps.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        steps
    }

    /// Length of the JSON encoding, used as the context's size.
    pub fn estimated_size(&self) -> usize {
        serde_json::to_vec(self).map_or(0, |bytes| bytes.len())
    }

    /// Seeds this context with what an earlier run of the same session left.
    ///
    /// History and decisions from `prior` come first. Current shared-state
    /// values win over prior ones.
    pub fn absorb(&mut self, prior: WorkflowContext) {
        let mut log = prior.conversation_log;
        log.append(&mut self.conversation_log);
        self.conversation_log = log;

        let mut decisions = prior.key_decisions;
        decisions.append(&mut self.key_decisions);
        self.key_decisions = decisions;

        for (key, value) in prior.shared_state {
            self.shared_state.entry(key).or_insert(value);
        }
        for (id, step) in prior.step_results {
            self.step_results.entry(id).or_insert(step);
        }
        if self.compressed_info.is_none() {
            self.compressed_info = prior.compressed_info;
        }
        self.tokens_used = self.tokens_used.saturating_add(prior.tokens_used);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Shared handle to a [`WorkflowContext`].
///
/// Readers take a shared lock, writers hold the exclusive lock for exactly
/// one logical update. Clones refer to the same context.
#[derive(Clone, Default)]
pub struct ContextHandle {
    inner: Arc<RwLock<WorkflowContext>>,
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read(|ctx| {
            f.debug_struct("ContextHandle")
                .field("id", &ctx.id)
                .field("workflow_id", &ctx.workflow_id)
                .field("entries", &ctx.conversation_log.len())
                .field("decisions", &ctx.key_decisions.len())
                .field("tokens_used", &ctx.tokens_used)
                .finish_non_exhaustive()
        })
    }
}

impl ContextHandle {
    pub fn new(context: WorkflowContext) -> Self {
        Self { inner: Arc::new(RwLock::new(context)) }
    }

    /// Handle to a fresh context for `workflow_id`.
    pub fn for_workflow(workflow_id: &str) -> Self {
        Self::new(WorkflowContext::new(workflow_id))
    }

    /// Runs `f` under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&WorkflowContext) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Runs `f` under the exclusive lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut WorkflowContext) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Copy of the current context.
    pub fn snapshot(&self) -> WorkflowContext {
        self.read(Clone::clone)
    }
}

impl Serialize for ContextHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.read(|ctx| ctx.serialize(serializer))
    }
}

impl<'de> Deserialize<'de> for ContextHandle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WorkflowContext::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_state_last_write_wins() {
        let mut ctx = WorkflowContext::new("wf");
        ctx.set_state("x", json!(1));
        ctx.set_state("x", json!(2));
        assert_eq!(ctx.state("x"), Some(&json!(2)));
    }

    #[test]
    fn test_impact_ordering() {
        assert!(DecisionImpact::Critical.is_critical());
        assert!(DecisionImpact::High.is_critical());
        assert!(!DecisionImpact::Medium.is_critical());
        assert!(DecisionImpact::Low < DecisionImpact::Medium);
    }

    #[test]
    fn test_absorb_prepends_history() {
        let mut prior = WorkflowContext::new("old").with_session("s1");
        prior.add_entry(ConversationEntry::new("p1", EntryKind::StepComplete, "earlier"));
        prior.set_state("lang", json!("go"));
        prior.set_state("kept", json!(true));
        prior.add_tokens(40);

        let mut ctx = WorkflowContext::new("new").with_session("s1");
        ctx.add_entry(ConversationEntry::new("n1", EntryKind::StepStart, "now"));
        ctx.set_state("lang", json!("rust"));
        ctx.add_tokens(2);

        ctx.absorb(prior);

        assert_eq!(ctx.conversation_log[0].content, "earlier");
        assert_eq!(ctx.conversation_log[1].content, "now");
        assert_eq!(ctx.state("lang"), Some(&json!("rust")));
        assert_eq!(ctx.state("kept"), Some(&json!(true)));
        assert_eq!(ctx.tokens_used, 42);
        assert_eq!(ctx.workflow_id, "new");
    }

    #[test]
    fn test_handle_concurrent_appends() {
        let handle = ContextHandle::for_workflow("wf");
        let writers: Vec<_> = (0..8)
            .map(|i| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for j in 0..25 {
                        handle.update(|ctx| {
                            ctx.add_entry(ConversationEntry::new(
                                format!("s{i}"),
                                EntryKind::Note,
                                format!("{j}"),
                            ));
                            ctx.add_tokens(1);
                        });
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.conversation_log.len(), 200);
        assert_eq!(snapshot.tokens_used, 200);
    }

    #[test]
    fn test_handle_serde_round_trip() {
        let handle = ContextHandle::for_workflow("wf");
        handle.update(|ctx| ctx.set_state("x", json!("y")));

        let encoded = serde_json::to_string(&handle).unwrap();
        let decoded: ContextHandle = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.snapshot(), handle.snapshot());
    }
}
