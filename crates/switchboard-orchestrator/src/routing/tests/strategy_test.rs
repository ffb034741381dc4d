//! Tests for the pure selection strategies.

use super::super::strategy::{BalancedScorer, choose};
use super::super::types::{BackendHealth, RoutingStrategy};

fn candidate(name: &str, cost: f64, priority: i32, latency: f64, error_rate: f64) -> (String, BackendHealth) {
    let mut health = BackendHealth::new(cost, priority);
    health.latency_seconds = latency;
    health.error_rate = error_rate;
    (name.to_string(), health)
}

fn pick(strategy: RoutingStrategy, candidates: &[(String, BackendHealth)], tick: u64) -> String {
    let index = choose(strategy, candidates, tick).unwrap();
    candidates[index].0.clone()
}

#[test]
fn test_empty_candidates() {
    assert_eq!(choose(RoutingStrategy::Balanced, &[], 0), None);
}

#[test]
fn test_cost_optimal_picks_cheapest() {
    let candidates = vec![
        candidate("premium", 3.0, 5, 0.2, 0.0),
        candidate("budget", 0.5, 1, 2.0, 0.0),
        candidate("mid", 1.0, 3, 1.0, 0.0),
    ];
    assert_eq!(pick(RoutingStrategy::CostOptimal, &candidates, 0), "budget");
}

#[test]
fn test_performance_picks_fastest() {
    let candidates = vec![
        candidate("premium", 3.0, 5, 0.2, 0.0),
        candidate("budget", 0.5, 1, 2.0, 0.0),
    ];
    assert_eq!(pick(RoutingStrategy::Performance, &candidates, 0), "premium");
}

#[test]
fn test_priority_failover_picks_highest_priority() {
    let candidates = vec![
        candidate("low", 1.0, 1, 0.1, 0.0),
        candidate("high", 1.0, 9, 0.1, 0.0),
        candidate("mid", 1.0, 5, 0.1, 0.0),
    ];
    assert_eq!(pick(RoutingStrategy::PriorityFailover, &candidates, 0), "high");
}

#[test]
fn test_ties_go_to_first_candidate() {
    let candidates = vec![candidate("first", 1.0, 2, 0.5, 0.0), candidate("second", 1.0, 2, 0.5, 0.0)];
    for strategy in [
        RoutingStrategy::CostOptimal,
        RoutingStrategy::Performance,
        RoutingStrategy::PriorityFailover,
        RoutingStrategy::Balanced,
    ] {
        assert_eq!(pick(strategy, &candidates, 0), "first", "{strategy} broke a tie");
    }
}

#[test]
fn test_round_robin_follows_tick() {
    let candidates = vec![
        candidate("a", 1.0, 1, 0.0, 0.0),
        candidate("b", 1.0, 1, 0.0, 0.0),
        candidate("c", 1.0, 1, 0.0, 0.0),
    ];
    let picks: Vec<String> = (0..6).map(|tick| pick(RoutingStrategy::RoundRobin, &candidates, tick)).collect();
    assert_eq!(picks, vec!["a", "b", "c", "a", "b", "c"]);
}

#[test]
fn test_balanced_score_components() {
    let candidates = vec![candidate("only", 0.0, 4, 0.0, 0.0)];
    let scorer = BalancedScorer::new(&candidates);
    // Full priority, no errors, no latency spread, free.
    assert!((scorer.score(&candidates[0].1) - 1.0).abs() < 1e-9);

    let candidates = vec![candidate("slow", 1.0, 0, 2.0, 0.5), candidate("fast", 1.0, 0, 1.0, 0.5)];
    let scorer = BalancedScorer::new(&candidates);
    let slow = scorer.score(&candidates[0].1);
    let fast = scorer.score(&candidates[1].1);
    // Priority term is zero when no candidate has positive priority.
    assert!((slow - (0.3 * 0.5 + 0.0 + 0.1 * 0.5)).abs() < 1e-9);
    assert!((fast - (0.3 * 0.5 + 0.2 * 0.5 + 0.1 * 0.5)).abs() < 1e-9);
}

#[test]
fn test_balanced_prefers_reliable_backend() {
    let candidates = vec![
        candidate("flaky", 1.0, 5, 0.5, 0.4),
        candidate("steady", 1.0, 5, 0.5, 0.0),
    ];
    assert_eq!(pick(RoutingStrategy::Balanced, &candidates, 0), "steady");
}

#[test]
fn test_balanced_prefers_higher_priority() {
    let candidates = vec![
        candidate("backup", 1.0, 1, 0.5, 0.0),
        candidate("primary", 1.0, 10, 0.5, 0.0),
    ];
    assert_eq!(pick(RoutingStrategy::Balanced, &candidates, 0), "primary");
}
