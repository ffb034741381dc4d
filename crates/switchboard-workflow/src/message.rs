//! Contextual message composition for workflow steps.

use crate::compression::truncate;
use crate::context::{DecisionImpact, WorkflowContext};
use crate::workflow::WorkflowStep;
use std::fmt::Write as _;

/// Conversation entries included in a step message.
pub const HISTORY_WINDOW: usize = 20;
const ENTRY_CHARS: usize = 200;
const OUTPUT_CHARS: usize = 300;

/// Builds the message sent to the agent for `step`.
///
/// Sections appear only when they have content: recent conversation
/// history, decisions of medium impact or more, previous step outputs, the
/// step's declared input and the compressed summary.
pub fn compose_step_message(step: &WorkflowStep, ctx: &WorkflowContext) -> String {
    let mut message = format!(
        "WORKFLOW STEP EXECUTION\nStep: {} ({})\nType: {}\n",
        step.name, step.id, step.step_type
    );

    let skip = ctx.conversation_log.len().saturating_sub(HISTORY_WINDOW);
    if !ctx.conversation_log.is_empty() {
        message.push_str("\n=== CONVERSATION HISTORY ===\n");
        for entry in ctx.conversation_log.iter().skip(skip) {
            let _ = writeln!(
                message,
                "[{}] {} ({}): {}",
                entry.timestamp.format("%H:%M:%S"),
                entry.step_id,
                entry.kind,
                truncate(&entry.content, ENTRY_CHARS)
            );
        }
    }

    let impactful: Vec<_> =
        ctx.key_decisions.iter().filter(|d| d.impact >= DecisionImpact::Medium).collect();
    if !impactful.is_empty() {
        message.push_str("\n=== KEY DECISIONS MADE ===\n");
        for decision in impactful {
            let _ = writeln!(
                message,
                "- [{}] {}: {} (Impact: {})",
                decision.step_id, decision.decision, decision.reasoning, decision.impact
            );
        }
    }

    let outputs: Vec<_> = ctx
        .completed_steps()
        .into_iter()
        .filter_map(|prior| prior.response().map(|response| (prior.id.as_str(), response)))
        .collect();
    if !outputs.is_empty() {
        message.push_str("\n=== PREVIOUS STEP OUTPUTS ===\n");
        for (id, response) in outputs {
            let _ = writeln!(message, "Step {}: {}", id, truncate(response, OUTPUT_CHARS));
        }
    }

    if !step.input.is_empty() {
        message.push_str("\n=== CURRENT STEP INPUT ===\n");
        if let Ok(input) = serde_json::to_string_pretty(&step.input) {
            message.push_str(&input);
            message.push('\n');
        }
    }

    if let Some(compressed) = &ctx.compressed_info {
        let _ = write!(message, "\n=== COMPRESSED CONTEXT ===\n{}\n", compressed.summary);
        for point in &compressed.key_points {
            let _ = writeln!(message, "• {}", point);
        }
    }

    message.push_str("\nNow execute this step with full awareness of all previous context and decisions.\n");
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::compress;
    use crate::context::{ConversationEntry, EntryKind, KeyDecision};
    use crate::workflow::StepType;
    use serde_json::json;

    #[test]
    fn test_first_step_has_only_header_and_input() {
        let ctx = WorkflowContext::new("wf");
        let step = WorkflowStep::new("s1", "Analyze Requirements", StepType::Analyze)
            .with_input("goal", json!("parse logs"));

        let message = compose_step_message(&step, &ctx);

        assert!(message.starts_with("WORKFLOW STEP EXECUTION\nStep: Analyze Requirements (s1)\nType: analyze\n"));
        assert!(message.contains("=== CURRENT STEP INPUT ==="));
        assert!(message.contains("\"goal\": \"parse logs\""));
        assert!(!message.contains("CONVERSATION HISTORY"));
        assert!(!message.contains("COMPRESSED CONTEXT"));
    }

    #[test]
    fn test_includes_history_decisions_and_outputs() {
        let mut ctx = WorkflowContext::new("wf");
        ctx.add_entry(ConversationEntry::new("s1", EntryKind::StepComplete, "picked tokio"));
        ctx.add_decision(KeyDecision::new("s1", "use tokio", "mature runtime", DecisionImpact::High));
        ctx.add_decision(KeyDecision::new("s1", "tabs vs spaces", "trivial", DecisionImpact::Low));
        let mut prior = WorkflowStep::new("s1", "Design", StepType::Decision);
        prior.mark_running();
        prior.mark_completed(json!({"response": "runtime chosen"}));
        ctx.record_step(prior);

        let step = WorkflowStep::new("s2", "Build", StepType::Generate);
        let message = compose_step_message(&step, &ctx);

        assert!(message.contains("s1 (step_complete): picked tokio"));
        assert!(message.contains("- [s1] use tokio: mature runtime (Impact: high)"));
        assert!(!message.contains("tabs vs spaces"));
        assert!(message.contains("Step s1: runtime chosen"));
    }

    #[test]
    fn test_history_is_windowed_and_summary_appended() {
        let mut ctx = WorkflowContext::new("wf");
        for i in 0..40 {
            ctx.add_entry(ConversationEntry::new("s", EntryKind::Note, format!("entry-{i:02}")));
        }
        let step = WorkflowStep::new("s9", "Next", StepType::Process);

        let message = compose_step_message(&step, &ctx);
        assert!(!message.contains("entry-19"));
        assert!(message.contains("entry-20"));
        assert!(message.contains("entry-39"));
        assert!(!message.contains("COMPRESSED CONTEXT"));

        compress(&mut ctx);
        let message = compose_step_message(&step, &ctx);
        assert!(message.contains("=== COMPRESSED CONTEXT ===\nWORKFLOW PROGRESS SUMMARY:"));
    }
}
