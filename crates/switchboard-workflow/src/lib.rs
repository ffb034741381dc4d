//! Sequential workflow engine for Switchboard.
//!
//! A [`Workflow`] is an ordered list of [`WorkflowStep`]s that share one
//! [`WorkflowContext`]. The [`WorkflowEngine`] runs the steps in order,
//! composing each step's message from the accumulated context and handing it
//! to a [`TaskExecutor`](switchboard_orchestrator::TaskExecutor). Context
//! growth is bounded by lossy [`compression`], and contexts can be carried
//! across runs of the same session through a [`ContextStore`].

pub mod builder;
pub mod compression;
pub mod condition;
pub mod config;
pub mod context;
pub mod decision;
pub mod engine;
pub mod error;
pub mod message;
pub mod store;
pub mod workflow;

pub use builder::{
    Template, WorkflowBuilder, coding_workflow, content_creation_workflow, data_analysis_workflow,
    problem_solving_workflow, research_workflow,
};
pub use compression::{CompressionReport, compress, compress_if_needed};
pub use condition::{Condition, ConditionError, Operator};
pub use config::WorkflowConfig;
pub use context::{
    CompressedContext, ContextHandle, ConversationEntry, DecisionImpact, EntryKind, KeyDecision,
    WorkflowContext,
};
pub use decision::{FixedImpact, ImpactScorer, synthesize};
pub use engine::{WorkflowEngine, WorkflowSummary};
pub use error::{Result, WorkflowError};
pub use message::compose_step_message;
pub use store::{ContextStore, FileContextStore, InMemoryContextStore};
pub use workflow::{StepStatus, StepType, Workflow, WorkflowStatus, WorkflowStep};
