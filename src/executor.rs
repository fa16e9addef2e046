//! C4 — Tool Executor.
//!
//! Runs a single `ToolCall` end to end: dedup lookup, circuit check, the
//! retry loop with timeout/backoff+jitter, hedging for read-only `tmdb_*`
//! calls, error classification, and breaker recording (§4.4).

use crate::cache::{canonicalize_args, dedup_lookup, ResultCache};
use crate::circuit::CircuitBreaker;
use crate::config::{ResolvedTuning, RuntimeConfig};
use crate::model::{ErrorKind, Outcome, RunState, ToolCall, ToolError, ToolResult};
use crate::registry::ToolRegistry;
use crate::tools::{classify_family, is_write_style, Family};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

fn now_ms_jitter(base_ms: u64, attempt: u32) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(6));
    let jitter = rand::thread_rng().gen_range(0..=(exp / 4).max(1));
    Duration::from_millis(exp + jitter)
}

/// Attempt to repair mildly malformed tool-call JSON the LLM may have
/// produced: trim a trailing comma, or treat a bare non-object body as the
/// sole string argument under `"query"`. Mirrors the original bot's
/// `_repair_json` fallback, which covers exactly these two cases rather than
/// attempting a general parser.
fn repair_json(raw: &str) -> Option<serde_json::Value> {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(raw) {
        return Some(v);
    }
    let trimmed = raw.trim().trim_end_matches(',');
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return Some(v);
    }
    if !raw.trim().starts_with('{') {
        return Some(serde_json::json!({ "query": raw.trim().trim_matches('"') }));
    }
    None
}

/// Classify a raw tool error string into the §3 `ErrorKind` taxonomy. Order
/// matters: the most specific markers are checked first so e.g. a
/// "validation failed: already exists" message is not miscategorized as a
/// generic validation failure.
fn classify_error(message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("already exists") {
        ErrorKind::NonRetryable
    } else if lower.contains("invalid") && lower.contains("argument") {
        ErrorKind::NonRetryable
    } else if lower.contains("unauthorized") || lower.contains("forbidden") || lower.contains("auth") {
        ErrorKind::NonRetryable
    } else if lower.contains("rate limit") || lower.contains("429") {
        ErrorKind::RateLimited
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorKind::Timeout
    } else if lower.contains("503") || lower.contains("connection") || lower.contains("network") {
        ErrorKind::Retryable
    } else {
        ErrorKind::Retryable
    }
}

/// Holds only `Arc`s so an `Executor` can be cloned into a spawned task
/// (the batch scheduler runs reads concurrently, each on its own task).
#[derive(Clone)]
pub struct Executor {
    pub registry: Arc<ToolRegistry>,
    pub cache: Arc<ResultCache>,
    pub breaker: Arc<CircuitBreaker>,
    pub config: Arc<RuntimeConfig>,
}

impl Executor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        cache: Arc<ResultCache>,
        breaker: Arc<CircuitBreaker>,
        config: Arc<RuntimeConfig>,
    ) -> Self {
        Self { registry, cache, breaker, config }
    }

    /// Execute `call` against `run_state`'s dedup map, updating both the
    /// dedup map and (for read-only tools) the cross-run cache on success
    /// (§4.4 steps 1-7).
    pub async fn execute(&self, call: &ToolCall, run_state: &mut RunState) -> ToolResult {
        let family = classify_family(&call.tool_name);
        let write_style = is_write_style(&call.tool_name);
        let dedup_key = canonicalize_args(&call.tool_name, &call.arguments);

        if let Some(hit) = dedup_lookup(&run_state.dedup_cache, &dedup_key) {
            return hit;
        }

        if !write_style {
            if let Some(value) = self.cache.get(&dedup_key) {
                let result = ToolResult {
                    call_id: call.call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    outcome: Outcome::Ok,
                    value: Some(value),
                    error: None,
                    attempts: 0,
                    duration_ms: 0,
                    cache_hit: true,
                    ref_id: None,
                };
                run_state.dedup_cache.insert(dedup_key, result.clone());
                return result;
            }
        }

        let tuning = self.config.tool_tuning(&call.tool_name, family.as_str());

        if self.breaker.is_open(&call.tool_name, &tuning) {
            let result = ToolResult {
                call_id: call.call_id.clone(),
                tool_name: call.tool_name.clone(),
                outcome: Outcome::Error,
                value: None,
                error: Some(ToolError {
                    kind: ErrorKind::CircuitOpen,
                    message: format!("circuit open for {}", call.tool_name),
                }),
                attempts: 0,
                duration_ms: 0,
                cache_hit: false,
                ref_id: None,
            };
            run_state.dedup_cache.insert(dedup_key, result.clone());
            return result;
        }

        let started = std::time::Instant::now();
        let result = if !write_style && family == Family::Tmdb && tuning.hedge_delay_ms > 0 {
            self.run_hedged(call, &tuning).await
        } else {
            self.run_with_retries(call, &tuning).await
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut result = result;
        result.duration_ms = duration_ms;

        match &result.error {
            Some(err) if err.kind.counts_toward_breaker() => self.breaker.record_failure(&call.tool_name),
            _ => self.breaker.record_success(&call.tool_name),
        }

        if result.is_ok() && !write_style {
            if let Some(value) = &result.value {
                self.cache.put(dedup_key.clone(), value.clone(), self.config.cache.ttl_short_sec);
            }
        }
        run_state.dedup_cache.insert(dedup_key, result.clone());
        result
    }

    async fn run_with_retries(&self, call: &ToolCall, tuning: &ResolvedTuning) -> ToolResult {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let outcome = self.run_once(call, tuning).await;
            match outcome {
                Ok(value) => {
                    return ToolResult {
                        call_id: call.call_id.clone(),
                        tool_name: call.tool_name.clone(),
                        outcome: Outcome::Ok,
                        value: Some(value),
                        error: None,
                        attempts,
                        duration_ms: 0,
                        cache_hit: false,
                        ref_id: None,
                    };
                }
                Err(kind_msg) => {
                    let (kind, message) = kind_msg;
                    if kind.is_retryable() && attempts <= tuning.retry_max {
                        tokio::time::sleep(now_ms_jitter(tuning.backoff_base_ms, attempts)).await;
                        continue;
                    }
                    return ToolResult {
                        call_id: call.call_id.clone(),
                        tool_name: call.tool_name.clone(),
                        outcome: Outcome::Error,
                        value: None,
                        error: Some(ToolError { kind, message }),
                        attempts,
                        duration_ms: 0,
                        cache_hit: false,
                        ref_id: None,
                    };
                }
            }
        }
    }

    /// Hedging: for read-only tmdb calls, fire a second speculative attempt
    /// after `hedge_delay_ms` if the first has not yet returned, and take
    /// whichever finishes first (§4.4, §4.5).
    async fn run_hedged(&self, call: &ToolCall, tuning: &ResolvedTuning) -> ToolResult {
        let primary = self.run_with_retries(call, tuning);
        tokio::pin!(primary);
        let hedge_delay = tokio::time::sleep(Duration::from_millis(tuning.hedge_delay_ms));
        tokio::pin!(hedge_delay);

        tokio::select! {
            result = &mut primary => return result,
            _ = &mut hedge_delay => {}
        }

        let secondary = self.run_with_retries(call, tuning);
        tokio::select! {
            result = primary => result,
            result = secondary => result,
        }
    }

    async fn run_once(&self, call: &ToolCall, tuning: &ResolvedTuning) -> Result<serde_json::Value, (ErrorKind, String)> {
        let timeout = Duration::from_millis(tuning.timeout_ms);
        let fut = self.registry.execute(call);
        match tokio::time::timeout(timeout, fut).await {
            Ok(Some(Ok(value))) => Ok(value),
            Ok(Some(Err(message))) => Err((classify_error(&message), message)),
            Ok(None) => Err((ErrorKind::NonRetryable, format!("unknown tool {}", call.tool_name))),
            Err(_) => Err((ErrorKind::Timeout, format!("{} timed out after {}ms", call.tool_name, tuning.timeout_ms))),
        }
    }
}

/// Parse raw argument text into a `ToolCall`'s `arguments`, attempting
/// `repair_json` on failure (§4.4 step 1). Returns `invalid_json` on
/// unrecoverable input.
pub fn parse_call_arguments(raw: &str) -> Result<serde_json::Value, ToolError> {
    repair_json(raw).ok_or_else(|| ToolError {
        kind: ErrorKind::InvalidJson,
        message: format!("could not parse arguments: {raw}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_accepts_well_formed_json() {
        assert_eq!(repair_json(r#"{"a": 1}"#), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn repair_strips_trailing_comma() {
        assert_eq!(repair_json(r#"{"a": 1,}"#), Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn repair_wraps_bare_string_as_query() {
        assert_eq!(repair_json("the matrix"), Some(serde_json::json!({"query": "the matrix"})));
    }

    #[test]
    fn classifies_already_exists_as_non_retryable() {
        assert_eq!(classify_error("movie already exists in library"), ErrorKind::NonRetryable);
    }

    #[test]
    fn classifies_rate_limit() {
        assert_eq!(classify_error("HTTP 429 rate limit exceeded"), ErrorKind::RateLimited);
    }

    #[test]
    fn classifies_timeout() {
        assert_eq!(classify_error("request timed out"), ErrorKind::Timeout);
    }

    #[test]
    fn classifies_network_as_retryable() {
        assert_eq!(classify_error("connection reset by peer"), ErrorKind::Retryable);
    }

    #[tokio::test]
    async fn dedup_hit_short_circuits_execution() {
        use crate::cache::ResultCache;
        use crate::circuit::CircuitBreaker;
        use crate::config::RuntimeConfig;
        use crate::registry::ToolRegistry;

        let cache = Arc::new(ResultCache::new());
        let registry = Arc::new(ToolRegistry::new().register_all_builtin(cache.clone()));
        let breaker = Arc::new(CircuitBreaker::new());
        let config = Arc::new(RuntimeConfig::default());
        let executor = Executor::new(registry, cache, breaker, config);
        let mut run_state = RunState::new(false);

        let call = ToolCall {
            call_id: "1".to_string(),
            tool_name: "tmdb_search".to_string(),
            arguments: serde_json::json!({"query": "the matrix"}),
        };
        let first = executor.execute(&call, &mut run_state).await;
        assert!(!first.cache_hit);

        let call2 = ToolCall { call_id: "2".to_string(), ..call };
        let second = executor.execute(&call2, &mut run_state).await;
        assert!(second.cache_hit);
        assert_eq!(second.attempts, 0);
    }

    #[tokio::test]
    async fn circuit_open_short_circuits_with_error() {
        use crate::cache::ResultCache;
        use crate::circuit::CircuitBreaker;
        use crate::config::RuntimeConfig;
        use crate::registry::ToolRegistry;

        let cache = Arc::new(ResultCache::new());
        let registry = Arc::new(ToolRegistry::new().register_all_builtin(cache.clone()));
        let breaker = Arc::new(CircuitBreaker::new());
        let config = Arc::new(RuntimeConfig::default());
        for _ in 0..config.tools.circuit_open_after_failures {
            breaker.record_failure("radarr_add_movie");
        }
        let executor = Executor::new(registry, cache, breaker, config);
        let mut run_state = RunState::new(false);
        let call = ToolCall {
            call_id: "1".to_string(),
            tool_name: "radarr_add_movie".to_string(),
            arguments: serde_json::json!({"tmdb_id": 603}),
        };
        let result = executor.execute(&call, &mut run_state).await;
        assert!(!result.is_ok());
        assert_eq!(result.error.unwrap().kind, ErrorKind::CircuitOpen);
    }
}
