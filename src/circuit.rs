//! C3 — Circuit Breaker.
//!
//! Per-tool failure bookkeeping (`CircuitState`, in `model.rs`) behind a
//! shared map so every caller in a run — and across runs, since a backend
//! failing once tends to keep failing — sees the same breaker state.

use crate::config::ResolvedTuning;
use crate::model::CircuitState;
use std::collections::HashMap;
use std::sync::Mutex;

pub struct CircuitBreaker {
    states: Mutex<HashMap<String, CircuitState>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self { states: Mutex::new(HashMap::new()) }
    }

    /// §4.3: a tool call is rejected before it ever reaches the executor's
    /// retry loop when its breaker is open.
    pub fn is_open(&self, tool_name: &str, tuning: &ResolvedTuning) -> bool {
        let states = self.states.lock().unwrap();
        match states.get(tool_name) {
            Some(state) => state.is_open(tuning.circuit_open_threshold, tuning.circuit_cooldown_ms),
            None => false,
        }
    }

    pub fn record_success(&self, tool_name: &str) {
        self.states.lock().unwrap().entry(tool_name.to_string()).or_default().record_success();
    }

    pub fn record_failure(&self, tool_name: &str) {
        self.states.lock().unwrap().entry(tool_name.to_string()).or_default().record_failure();
    }

    pub fn failure_count(&self, tool_name: &str) -> u32 {
        self.states.lock().unwrap().get(tool_name).map(|s| s.failure_count).unwrap_or(0)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn tuning() -> ResolvedTuning {
        RuntimeConfig::default().tool_tuning("radarr_add_movie", "radarr")
    }

    #[test]
    fn closed_by_default() {
        let breaker = CircuitBreaker::new();
        assert!(!breaker.is_open("radarr_add_movie", &tuning()));
    }

    #[test]
    fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new();
        let t = tuning();
        for _ in 0..t.circuit_open_threshold {
            breaker.record_failure("radarr_add_movie");
        }
        assert!(breaker.is_open("radarr_add_movie", &t));
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new();
        let t = tuning();
        for _ in 0..t.circuit_open_threshold {
            breaker.record_failure("radarr_add_movie");
        }
        breaker.record_success("radarr_add_movie");
        assert!(!breaker.is_open("radarr_add_movie", &t));
        assert_eq!(breaker.failure_count("radarr_add_movie"), 0);
    }
}
