//! Backend selection strategies.
//!
//! Strategies are pure: given the ordered candidate list and their health
//! they return the index of the chosen candidate. Ties go to the earliest
//! candidate.

use super::types::{BackendHealth, RoutingStrategy};

const PRIORITY_WEIGHT: f64 = 0.4;
const RELIABILITY_WEIGHT: f64 = 0.3;
const LATENCY_WEIGHT: f64 = 0.2;
const COST_WEIGHT: f64 = 0.1;

/// Picks one candidate.
///
/// `tick` is the router's round-robin counter; other strategies ignore it.
/// Returns `None` only for an empty candidate list.
pub fn choose(
    strategy: RoutingStrategy,
    candidates: &[(String, BackendHealth)],
    tick: u64,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    let index = match strategy {
        RoutingStrategy::CostOptimal => argmin(candidates, |h| h.cost_per_unit),
        RoutingStrategy::Performance => argmin(candidates, |h| h.latency_seconds),
        RoutingStrategy::RoundRobin => (tick % candidates.len() as u64) as usize,
        RoutingStrategy::PriorityFailover => argmax(candidates, |h| f64::from(h.priority)),
        RoutingStrategy::Balanced => {
            let scorer = BalancedScorer::new(candidates);
            argmax(candidates, |h| scorer.score(h))
        }
    };
    Some(index)
}

fn argmin(candidates: &[(String, BackendHealth)], key: impl Fn(&BackendHealth) -> f64) -> usize {
    let mut best = 0;
    let mut best_value = key(&candidates[0].1);
    for (i, (_, health)) in candidates.iter().enumerate().skip(1) {
        let value = key(health);
        if value < best_value {
            best = i;
            best_value = value;
        }
    }
    best
}

fn argmax(candidates: &[(String, BackendHealth)], key: impl Fn(&BackendHealth) -> f64) -> usize {
    argmin(candidates, |h| -key(h))
}

/// Balanced score with candidate-relative normalization.
///
/// `0.4 * priority/max_priority + 0.3 * (1 - error_rate)
///  + 0.2 * (1 - latency/max_latency) + 0.1 * 1/(1 + cost)`
#[derive(Debug, Clone, Copy)]
pub struct BalancedScorer {
    max_priority: f64,
    max_latency: f64,
}

impl BalancedScorer {
    /// Captures the normalization bounds of a candidate set.
    pub fn new(candidates: &[(String, BackendHealth)]) -> Self {
        let max_priority =
            candidates.iter().map(|(_, h)| f64::from(h.priority)).fold(f64::MIN, f64::max);
        let max_latency = candidates.iter().map(|(_, h)| h.latency_seconds).fold(0.0, f64::max);
        Self { max_priority, max_latency }
    }

    /// Scores one candidate in `[0, 1]`.
    pub fn score(&self, health: &BackendHealth) -> f64 {
        let priority = if self.max_priority > 0.0 {
            (f64::from(health.priority) / self.max_priority).max(0.0)
        } else {
            0.0
        };
        let latency = if self.max_latency > 0.0 {
            1.0 - health.latency_seconds / self.max_latency
        } else {
            1.0
        };
        let cost = 1.0 / (1.0 + health.cost_per_unit.max(0.0));

        PRIORITY_WEIGHT * priority
            + RELIABILITY_WEIGHT * (1.0 - health.error_rate)
            + LATENCY_WEIGHT * latency
            + COST_WEIGHT * cost
    }
}
