//! Per-backend health records.

use super::types::BackendHealth;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Default)]
struct Entries {
    order: Vec<String>,
    records: HashMap<String, Arc<Mutex<BackendHealth>>>,
}

/// Registry of backend health records.
///
/// Each backend has its own lock, so outcomes recorded for different
/// backends never contend. The outer lock is only taken for writing when a
/// backend is registered.
#[derive(Default)]
pub struct HealthRegistry {
    entries: RwLock<Entries>,
}

impl fmt::Debug for HealthRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthRegistry")
            .field("backend_count", &self.entries.try_read().map(|e| e.order.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl HealthRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a backend, resetting its record if it already exists.
    ///
    /// Returns `true` if the backend was new.
    pub fn register(&self, name: &str, health: BackendHealth) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let was_new = !entries.records.contains_key(name);
        if was_new {
            entries.order.push(name.to_string());
        } else {
            warn!(backend = %name, "Backend re-registered, health reset");
        }
        entries.records.insert(name.to_string(), Arc::new(Mutex::new(health)));
        was_new
    }

    fn record_handle(&self, name: &str) -> Option<Arc<Mutex<BackendHealth>>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.records.get(name).cloned()
    }

    /// Copy of one backend's record.
    pub fn get(&self, name: &str) -> Option<BackendHealth> {
        self.record_handle(name)
            .map(|record| record.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Backend names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).order.clone()
    }

    /// Copies of all records in registration order.
    pub fn snapshot(&self) -> Vec<(String, BackendHealth)> {
        let handles: Vec<(String, Arc<Mutex<BackendHealth>>)> = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries
                .order
                .iter()
                .filter_map(|name| entries.records.get(name).map(|r| (name.clone(), Arc::clone(r))))
                .collect()
        };

        handles
            .into_iter()
            .map(|(name, record)| {
                let health = record.lock().unwrap_or_else(PoisonError::into_inner).clone();
                (name, health)
            })
            .collect()
    }

    /// Folds a call outcome into a backend's record.
    ///
    /// Returns the updated record, or `None` if the backend is unknown.
    pub fn record_outcome(
        &self,
        name: &str,
        success: bool,
        latency: Duration,
    ) -> Option<BackendHealth> {
        let record = self.record_handle(name)?;
        let mut health = record.lock().unwrap_or_else(PoisonError::into_inner);
        let was_available = health.available;
        health.record(success, latency);

        debug!(
            backend = %name,
            success,
            latency_ms = latency.as_millis() as u64,
            error_rate = health.error_rate,
            "Recorded backend outcome"
        );
        if was_available && !health.available {
            warn!(backend = %name, error_rate = health.error_rate, "Backend marked unavailable");
        } else if !was_available && health.available {
            info!(backend = %name, error_rate = health.error_rate, "Backend recovered");
        }

        Some(health.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_snapshot_order() {
        let registry = HealthRegistry::new();
        assert!(registry.register("b", BackendHealth::new(1.0, 1)));
        assert!(registry.register("a", BackendHealth::new(2.0, 2)));
        assert!(!registry.register("b", BackendHealth::new(3.0, 3)));

        let names: Vec<String> = registry.snapshot().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
        assert!((registry.get("b").unwrap().cost_per_unit - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_outcome_unknown_backend() {
        let registry = HealthRegistry::new();
        assert!(registry.record_outcome("ghost", true, Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_concurrent_outcomes_are_all_counted() {
        let registry = Arc::new(HealthRegistry::new());
        registry.register("shared", BackendHealth::new(1.0, 1));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        registry.record_outcome("shared", i % 2 == 0, Duration::from_millis(5));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let health = registry.get("shared").unwrap();
        assert_eq!(health.request_count, 400);
        assert!((0.0..=1.0).contains(&health.error_rate));
        if health.error_rate > 0.5 {
            assert!(!health.available);
        }
    }
}
