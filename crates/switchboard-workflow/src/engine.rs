//! Sequential workflow execution.
//!
//! The engine runs a workflow's steps strictly in order against one shared
//! context. Before each step the context is compressed if it has grown past
//! its threshold and the step's condition is checked. Agent work goes
//! through a [`TaskExecutor`], normally the task orchestrator.

use crate::compression::{compress, compress_if_needed};
use crate::config::WorkflowConfig;
use crate::context::{ContextHandle, ConversationEntry, EntryKind, WorkflowContext};
use crate::decision::{FixedImpact, ImpactScorer, synthesize};
use crate::error::{Result, WorkflowError};
use crate::message::compose_step_message;
use crate::store::ContextStore;
use crate::workflow::{StepType, Workflow, WorkflowStatus, WorkflowStep};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError};
use switchboard_abstraction::{ErrorKind, Task};
use switchboard_orchestrator::TaskExecutor;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A registered workflow.
struct Entry {
    workflow: Mutex<Workflow>,
    status: std::sync::RwLock<WorkflowStatus>,
    context: ContextHandle,
    name: String,
    steps: usize,
}

impl Entry {
    fn status(&self) -> WorkflowStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: WorkflowStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

/// Listing entry for a registered workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub status: WorkflowStatus,
    pub steps: usize,
}

/// Executes workflows and keeps a registry of them.
pub struct WorkflowEngine {
    executor: Arc<dyn TaskExecutor>,
    scorer: Arc<dyn ImpactScorer>,
    store: Option<Arc<dyn ContextStore>>,
    workflows: RwLock<HashMap<String, Arc<Entry>>>,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("scorer", &self.scorer)
            .field("has_store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    /// Creates an engine that scores every decision as medium impact and
    /// does not persist contexts.
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            scorer: Arc::new(FixedImpact::default()),
            store: None,
            workflows: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: Arc<dyn ImpactScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Loads prior session history from `store` before a run and saves the
    /// context back afterwards.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Registers `workflow` and returns its id.
    pub async fn create_workflow(&self, workflow: Workflow) -> Result<String> {
        workflow.validate().map_err(WorkflowError::Validation)?;
        let id = workflow.id.clone();
        let entry = Entry {
            status: std::sync::RwLock::new(workflow.status),
            context: workflow.context.clone(),
            name: workflow.name.clone(),
            steps: workflow.steps.len(),
            workflow: Mutex::new(workflow),
        };
        self.workflows.write().await.insert(id.clone(), Arc::new(entry));
        info!(workflow_id = %id, "Workflow created");
        Ok(id)
    }

    /// Runs a registered workflow.
    ///
    /// Fails with `AlreadyRunning` if another call is executing it.
    pub async fn execute_workflow(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        let entry = self.entry(id).await?;
        let mut workflow = entry
            .workflow
            .try_lock()
            .map_err(|_| WorkflowError::AlreadyRunning(id.to_string()))?;
        entry.set_status(WorkflowStatus::Running);
        let outcome = self.execute(&mut workflow, cancel).await;
        entry.set_status(workflow.status);
        outcome
    }

    pub async fn status(&self, id: &str) -> Result<WorkflowStatus> {
        Ok(self.entry(id).await?.status())
    }

    /// Snapshot of a workflow's context. Readable while the workflow runs.
    pub async fn context(&self, id: &str) -> Result<WorkflowContext> {
        Ok(self.entry(id).await?.context.snapshot())
    }

    /// Copy of a registered workflow, waiting for a running execution to
    /// finish first.
    pub async fn workflow(&self, id: &str) -> Result<Workflow> {
        let entry = self.entry(id).await?;
        let workflow = entry.workflow.lock().await;
        Ok(workflow.clone())
    }

    /// All registered workflows ordered by name.
    pub async fn list(&self) -> Vec<WorkflowSummary> {
        let mut summaries: Vec<WorkflowSummary> = self
            .workflows
            .read()
            .await
            .iter()
            .map(|(id, entry)| WorkflowSummary {
                id: id.clone(),
                name: entry.name.clone(),
                status: entry.status(),
                steps: entry.steps,
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    async fn entry(&self, id: &str) -> Result<Arc<Entry>> {
        self.workflows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| WorkflowError::WorkflowNotFound(id.to_string()))
    }

    /// Executes `workflow` step by step.
    ///
    /// Without `fail_fast` a failed step is recorded and execution moves on;
    /// the workflow still ends `Completed`. With `fail_fast`, or when
    /// `cancel` fires, the workflow ends `Failed` and the error is returned.
    pub async fn execute(&self, workflow: &mut Workflow, cancel: &CancellationToken) -> Result<()> {
        workflow.validate().map_err(WorkflowError::Validation)?;

        let started = Utc::now();
        workflow.status = WorkflowStatus::Running;
        workflow.started_at = Some(started);
        workflow.completed_at = None;
        workflow.total_duration_ms = None;
        for step in &mut workflow.steps {
            step.reset();
        }
        info!(
            workflow_id = %workflow.id,
            name = %workflow.name,
            steps = workflow.steps.len(),
            "Starting workflow execution"
        );

        let ctx = workflow.context.clone();
        let config = workflow.config.clone();
        let workflow_id = workflow.id.clone();

        let mut outcome = self.restore_session(&ctx).await;
        if outcome.is_ok() {
            for step in &mut workflow.steps {
                if cancel.is_cancelled() {
                    warn!(workflow_id = %workflow_id, step_id = %step.id, "Workflow cancelled");
                    outcome = Err(WorkflowError::Cancelled);
                    break;
                }

                prepare_context(&ctx, &config);

                if !condition_holds(step, &ctx) {
                    step.mark_skipped();
                    ctx.update(|c| c.record_step(step.clone()));
                    info!(workflow_id = %workflow_id, step_id = %step.id, "Step skipped, condition not met");
                    continue;
                }

                step.mark_running();
                if let Err(err) = self.run_step(step, &workflow_id, &config, &ctx, cancel).await {
                    step.mark_failed(err.to_string());
                    ctx.update(|c| {
                        c.add_entry(
                            ConversationEntry::new(&step.id, EntryKind::StepFailed, err.to_string())
                                .with_metadata("error_kind", json!(err.kind())),
                        );
                        c.record_step(step.clone());
                    });
                    if config.fail_fast {
                        error!(workflow_id = %workflow_id, step_id = %step.id, error = %err, "Step failed, aborting workflow");
                        outcome = Err(err);
                        break;
                    }
                    warn!(workflow_id = %workflow_id, step_id = %step.id, error = %err, "Step failed, continuing");
                }
            }
        }

        let finished = Utc::now();
        workflow.completed_at = Some(finished);
        workflow.total_duration_ms =
            Some(finished.signed_duration_since(started).num_milliseconds().max(0) as u64);
        workflow.status =
            if outcome.is_ok() { WorkflowStatus::Completed } else { WorkflowStatus::Failed };

        self.persist(&ctx).await;

        info!(
            workflow_id = %workflow.id,
            status = %workflow.status,
            duration_ms = workflow.total_duration_ms,
            tokens_used = ctx.read(|c| c.tokens_used),
            "Workflow execution finished"
        );
        outcome
    }

    async fn run_step(
        &self,
        step: &mut WorkflowStep,
        workflow_id: &str,
        config: &WorkflowConfig,
        ctx: &ContextHandle,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if step.step_type == StepType::Compress {
            let report = ctx.update(compress);
            step.mark_completed(json!({
                "response": format!("Context compressed to {:.0}% of its size", report.ratio * 100.0),
                "entries_removed": report.entries_removed,
                "decisions_removed": report.decisions_removed,
                "compression_ratio": report.ratio,
            }));
            ctx.update(|c| {
                c.add_entry(ConversationEntry::new(&step.id, EntryKind::StepComplete, "Context compressed"));
                c.record_step(step.clone());
            });
            return Ok(());
        }

        let message = ctx.read(|c| compose_step_message(step, c));
        ctx.update(|c| {
            c.add_entry(ConversationEntry::new(
                &step.id,
                EntryKind::StepStart,
                format!("Starting step: {}", step.name),
            ));
        });

        let category = step.category.unwrap_or(config.default_category);
        let task = Task::new(
            category,
            json!({
                "message": message,
                "step_id": step.id,
                "step_type": step.step_type,
                "input": step.input,
            }),
        )
        .with_metadata("step_id", step.id.clone())
        .with_metadata("workflow_id", workflow_id);
        debug!(workflow_id, step_id = %step.id, task_id = %task.id, %category, "Dispatching step");

        let result = self.executor.execute(task, cancel).await?;
        if !result.success {
            let (kind, message) = result.error.map_or_else(
                || (ErrorKind::AgentExecutionError, "step failed without an error".to_string()),
                |failure| (failure.kind, failure.message),
            );
            return Err(WorkflowError::StepFailed { step_id: step.id.clone(), kind, message });
        }

        let data = result.data.unwrap_or(Value::Null);
        let response = response_text(&data);
        let tokens = data.get("tokens_used").and_then(Value::as_u64).unwrap_or(0);
        let decision = if config.enable_decision_tracking {
            synthesize(step, &response, self.scorer.as_ref())
        } else {
            None
        };
        let state = data.get("state").and_then(Value::as_object).cloned();
        step.mark_completed(json!({
            "response": response,
            "tokens_used": tokens,
            "data": data,
        }));

        ctx.update(|c| {
            if let Some(decision) = decision {
                c.add_decision(decision);
            }
            c.add_tokens(tokens);
            for (key, value) in state.unwrap_or_default() {
                c.set_state(key, value);
            }
            c.add_entry(
                ConversationEntry::new(&step.id, EntryKind::StepComplete, response)
                    .with_metadata("tokens_used", json!(tokens)),
            );
            c.record_step(step.clone());
        });
        info!(
            workflow_id,
            step_id = %step.id,
            duration_ms = step.duration_ms,
            attempts = result.metrics.attempts,
            "Step completed"
        );
        Ok(())
    }

    async fn restore_session(&self, ctx: &ContextHandle) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let (session_id, fresh) = ctx.read(|c| (c.session_id.clone(), c.conversation_log.is_empty()));
        if session_id.is_empty() || !fresh {
            return Ok(());
        }
        if let Some(prior) = store.load(&session_id).await? {
            let entries = prior.conversation_log.len();
            ctx.update(|c| c.absorb(prior));
            info!(session_id = %session_id, entries, "Restored session context");
        }
        Ok(())
    }

    async fn persist(&self, ctx: &ContextHandle) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = ctx.snapshot();
        if snapshot.session_id.is_empty() {
            return;
        }
        if let Err(e) = store.save(&snapshot).await {
            warn!(session_id = %snapshot.session_id, error = %e, "Failed to save workflow context");
        }
    }
}

/// Compresses the context when it has grown past its threshold.
fn prepare_context(ctx: &ContextHandle, config: &WorkflowConfig) {
    let oversized = ctx.update(|c| {
        compress_if_needed(c, config.enable_compression, config.compression_threshold);
        let size = c.estimated_size();
        (size > config.max_context_size).then_some(size)
    });
    if let Some(size) = oversized {
        warn!(context_size = size, max_context_size = config.max_context_size, "Context exceeds maximum size");
    }
}

/// Malformed conditions count as not met.
fn condition_holds(step: &WorkflowStep, ctx: &ContextHandle) -> bool {
    let Some(condition) = &step.condition else {
        return true;
    };
    match ctx.read(|c| condition.evaluate(&c.shared_state)) {
        Ok(holds) => holds,
        Err(e) => {
            warn!(
                step_id = %step.id,
                kind = %ErrorKind::ConditionEvaluationError,
                error = %e,
                "Condition could not be evaluated"
            );
            false
        }
    }
}

/// Text of an agent's answer.
fn response_text(data: &Value) -> String {
    match data {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => ["response", "content"]
            .iter()
            .find_map(|key| other.get(key).and_then(Value::as_str))
            .map_or_else(|| other.to_string(), str::to_string),
    }
}
