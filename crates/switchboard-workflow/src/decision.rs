//! Key decision synthesis from step outputs.

use crate::compression::truncate;
use crate::context::{DecisionImpact, KeyDecision};
use crate::workflow::WorkflowStep;
use std::fmt;

/// Outputs at or below this many characters do not produce a decision.
pub const MIN_DECISION_CHARS: usize = 50;
/// Characters of output kept as the decision's reasoning.
const REASONING_CHARS: usize = 200;

/// Assigns an impact level to a step output.
pub trait ImpactScorer: Send + Sync {
    fn score(&self, step: &WorkflowStep, output: &str) -> DecisionImpact;
}

/// Scorer that returns the same impact for every output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FixedImpact(pub DecisionImpact);

impl ImpactScorer for FixedImpact {
    fn score(&self, _step: &WorkflowStep, _output: &str) -> DecisionImpact {
        self.0
    }
}

impl<F> ImpactScorer for F
where
    F: Fn(&WorkflowStep, &str) -> DecisionImpact + Send + Sync,
{
    fn score(&self, step: &WorkflowStep, output: &str) -> DecisionImpact {
        self(step, output)
    }
}

impl fmt::Debug for dyn ImpactScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ImpactScorer")
    }
}

/// Turns a step output into a key decision.
///
/// Returns `None` for outputs of [`MIN_DECISION_CHARS`] characters or fewer.
pub fn synthesize(
    step: &WorkflowStep,
    output: &str,
    scorer: &dyn ImpactScorer,
) -> Option<KeyDecision> {
    if output.chars().count() <= MIN_DECISION_CHARS {
        return None;
    }
    let impact = scorer.score(step, output);
    Some(KeyDecision::new(
        step.id.clone(),
        format!("Step {} output generated", step.name),
        truncate(output, REASONING_CHARS),
        impact,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepType;

    fn step() -> WorkflowStep {
        WorkflowStep::new("s1", "Design", StepType::Decision)
    }

    #[test]
    fn test_short_output_is_ignored() {
        let output = "a".repeat(MIN_DECISION_CHARS);
        assert!(synthesize(&step(), &output, &FixedImpact::default()).is_none());
    }

    #[test]
    fn test_default_impact_is_medium() {
        let output = "b".repeat(300);
        let decision = synthesize(&step(), &output, &FixedImpact::default()).unwrap();

        assert_eq!(decision.impact, DecisionImpact::Medium);
        assert_eq!(decision.step_id, "s1");
        assert_eq!(decision.decision, "Step Design output generated");
        assert_eq!(decision.reasoning.chars().filter(|c| *c == 'b').count(), REASONING_CHARS);
    }

    #[test]
    fn test_closure_scorer() {
        let scorer = |_step: &WorkflowStep, output: &str| {
            if output.contains("breaking change") { DecisionImpact::Critical } else { DecisionImpact::Low }
        };
        let output = format!("{} breaking change", "c".repeat(60));
        let decision = synthesize(&step(), &output, &scorer).unwrap();
        assert_eq!(decision.impact, DecisionImpact::Critical);
    }
}
