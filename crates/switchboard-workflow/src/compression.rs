//! Lossy context compression.
//!
//! Once a context grows past its threshold the middle of the conversation
//! log is dropped, low-impact decisions are discarded and a
//! [`CompressedContext`] summary is derived from what remains. Pruned
//! entries cannot be recovered.

use crate::context::{CompressedContext, WorkflowContext};
use chrono::Utc;
use std::fmt::Write as _;
use tracing::info;

/// Conversation entries kept from the start of the log.
pub const KEEP_HEAD: usize = 5;
/// Conversation entries kept from the end of the log.
pub const KEEP_TAIL: usize = 10;
/// Upper bound on derived key points.
pub const MAX_KEY_POINTS: usize = 10;
/// Characters of a step response kept in a key point.
pub const KEY_POINT_CHARS: usize = 100;
/// Decisions quoted in the summary.
const SUMMARY_DECISIONS: usize = 3;

/// Sizes measured around one compression run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionReport {
    pub original_size: usize,
    pub compressed_size: usize,
    pub entries_removed: usize,
    pub decisions_removed: usize,
    pub ratio: f64,
}

/// Compresses `ctx` in place.
///
/// Running it again without new entries leaves the log, decisions and key
/// points unchanged; only `compressed_at` and the ratio are refreshed.
pub fn compress(ctx: &mut WorkflowContext) -> CompressionReport {
    let original_size = ctx.estimated_size();

    let entries_before = ctx.conversation_log.len();
    if entries_before > KEEP_HEAD + KEEP_TAIL {
        ctx.conversation_log.drain(KEEP_HEAD..entries_before - KEEP_TAIL);
    }

    let decisions_before = ctx.key_decisions.len();
    ctx.key_decisions.retain(|decision| decision.impact.is_critical());

    let critical_decisions = ctx.key_decisions.clone();
    let info = CompressedContext {
        summary: summarize(ctx),
        key_points: key_points(ctx),
        critical_decisions,
        project_state: ctx.shared_state.clone(),
        compression_ratio: 1.0,
        compressed_at: Utc::now(),
    };
    ctx.compressed_info = Some(info);
    ctx.updated_at = Utc::now();

    let compressed_size = ctx.estimated_size();
    let ratio = if original_size == 0 { 1.0 } else { compressed_size as f64 / original_size as f64 };
    if let Some(info) = ctx.compressed_info.as_mut() {
        info.compression_ratio = ratio;
    }

    let report = CompressionReport {
        original_size,
        compressed_size,
        entries_removed: entries_before - ctx.conversation_log.len(),
        decisions_removed: decisions_before - ctx.key_decisions.len(),
        ratio,
    };
    info!(
        context_id = %ctx.id,
        original_size,
        compressed_size,
        entries_removed = report.entries_removed,
        decisions_removed = report.decisions_removed,
        compression_ratio = ratio,
        "Context compressed"
    );
    report
}

/// Compresses `ctx` when compression is enabled and it exceeds `threshold`.
pub fn compress_if_needed(
    ctx: &mut WorkflowContext,
    enabled: bool,
    threshold: usize,
) -> Option<CompressionReport> {
    if !enabled {
        return None;
    }
    let size = ctx.estimated_size();
    if size <= threshold {
        return None;
    }
    info!(context_id = %ctx.id, context_size = size, threshold, "Context size threshold exceeded, compressing");
    Some(compress(ctx))
}

fn summarize(ctx: &WorkflowContext) -> String {
    let mut summary = String::from("WORKFLOW PROGRESS SUMMARY:\n");
    let _ = writeln!(summary, "- Completed {} workflow steps", ctx.completed_steps().len());
    let _ = writeln!(summary, "- Made {} key decisions", ctx.key_decisions.len());
    let _ = writeln!(summary, "- Total tokens used: {}", ctx.tokens_used);

    if !ctx.key_decisions.is_empty() {
        summary.push_str("\nMost important decisions:\n");
        for decision in ctx.key_decisions.iter().take(SUMMARY_DECISIONS) {
            let _ = writeln!(summary, "• {}", decision.decision);
        }
    }
    summary
}

fn key_points(ctx: &WorkflowContext) -> Vec<String> {
    ctx.completed_steps()
        .into_iter()
        .filter_map(|step| {
            let response = step.response()?.trim();
            (!response.is_empty())
                .then(|| format!("{}: {}", step.id, truncate(response, KEY_POINT_CHARS)))
        })
        .take(MAX_KEY_POINTS)
        .collect()
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
