//! Health-aware backend routing.
//!
//! This module selects one of several named backends per request using a
//! pluggable strategy, backed by continuously updated health telemetry.

pub mod health;
pub mod probe;
pub mod router;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod tests;

pub use health::HealthRegistry;
pub use probe::{HealthProber, ProbeOutcome};
pub use router::Router;
pub use strategy::BalancedScorer;
pub use types::{BackendHealth, RouteResponse, RoutingStrategy};
