//! End-to-end scenario coverage for the agent loop, executor, and circuit
//! breaker, exercised through the public crate API rather than internal
//! unit tests. Each scenario below mirrors one of the documented run
//! patterns: a simple add-and-validate, in-batch dedup, a breaker trip,
//! the write-intent guard, hedging, and non-retryable classification.

use async_trait::async_trait;
use household_agent::cache::ResultCache;
use household_agent::circuit::CircuitBreaker;
use household_agent::config::RuntimeConfig;
use household_agent::executor::Executor;
use household_agent::llm::MockLlmClient;
use household_agent::model::{RunState, ToolCall};
use household_agent::registry::ToolRegistry;
use household_agent::tools::ToolExecutable;
use household_agent::{AgentLoop, AgentMode};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn call(tool_name: &str, call_id: &str, arguments: serde_json::Value) -> ToolCall {
    ToolCall { call_id: call_id.to_string(), tool_name: tool_name.to_string(), arguments }
}

fn agent_loop(config: RuntimeConfig, llm: Arc<dyn household_agent::llm::LlmClient>) -> AgentLoop {
    let cache = Arc::new(ResultCache::new());
    let registry = Arc::new(ToolRegistry::new().register_all_builtin(cache.clone()));
    let breaker = Arc::new(CircuitBreaker::new());
    let progress = Arc::new(household_agent::progress::ProgressBroadcaster::new(0));
    AgentLoop::new(registry, cache, breaker, Arc::new(config), llm, progress)
}

/// S1 — simple add with validation: search, add, and a validation read that
/// confirms the addition before the turn is allowed to finalize.
#[tokio::test]
async fn s1_add_with_validation_finalizes_after_the_validation_read() {
    let llm = Arc::new(MockLlmClient::new(vec![
        MockLlmClient::tool_calls(vec![call("tmdb_search", "1", serde_json::json!({"query": "The Matrix", "year": 1999}))]),
        MockLlmClient::tool_calls(vec![call(
            "radarr_add_movie",
            "2",
            serde_json::json!({"tmdb_id": 603, "quality_profile_id": 1, "root_folder_path": "/m"}),
        )]),
        MockLlmClient::tool_calls(vec![call("radarr_get_movies", "3", serde_json::json!({}))]),
        MockLlmClient::text("Added The Matrix."),
    ]));
    let agent = agent_loop(RuntimeConfig::default(), llm);
    let outcome = agent.run_turn("add the matrix to radarr", AgentMode::Converse).await;

    assert_eq!(outcome.reply, "Added The Matrix.");
    assert_eq!(outcome.tool_calls, 3);
    assert_eq!(outcome.llm_calls, 4);
    assert!(!outcome.iteration_budget_exhausted);
}

/// S2 — dedup: two identical calls in the same batch execute the tool once;
/// the second comes back as a dedup hit with `attempts == 0`.
#[tokio::test]
async fn s2_duplicate_calls_in_one_turn_dedupe() {
    let cache = Arc::new(ResultCache::new());
    let registry = Arc::new(ToolRegistry::new().register_all_builtin(cache.clone()));
    let breaker = Arc::new(CircuitBreaker::new());
    let config = Arc::new(RuntimeConfig::default());
    let executor = Executor::new(registry, cache, breaker, config);
    let scheduler = household_agent::scheduler::BatchScheduler::new(executor, Arc::new(RuntimeConfig::default()));
    let mut run_state = RunState::new(false);

    let calls = vec![
        call("tmdb_search", "1", serde_json::json!({"query": "The Matrix"})),
        call("tmdb_search", "2", serde_json::json!({"query": "the matrix"})),
    ];
    let results = scheduler.run_batch(calls, &mut run_state).await;

    assert!(results[0].is_ok() && results[1].is_ok());
    let attempts: Vec<u32> = results.iter().map(|r| r.attempts).collect();
    assert!(attempts.contains(&0), "one of the two calls must be a dedup hit: {attempts:?}");
    assert!(results.iter().any(|r| r.cache_hit));
}

/// A tool that always fails, counting invocations so the test can assert the
/// breaker stops it from being called a third time.
struct AlwaysFailsTool {
    invocations: AtomicU32,
}

#[async_trait]
impl ToolExecutable for AlwaysFailsTool {
    fn name(&self) -> &str {
        "widget_probe"
    }
    fn description(&self) -> &str {
        "test-only tool that always fails"
    }
    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _call: &ToolCall) -> Result<serde_json::Value, String> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Err("Internal Server Error".to_string())
    }
}

/// S3 — circuit opens: after `circuit_open_after_failures` failing
/// invocations, the breaker trips and the next call is rejected before ever
/// reaching the tool.
#[tokio::test]
async fn s3_circuit_opens_after_threshold_failures() {
    let tool = Arc::new(AlwaysFailsTool { invocations: AtomicU32::new(0) });
    let registry = Arc::new(ToolRegistry::new().register(tool.clone()));
    let cache = Arc::new(ResultCache::new());
    let breaker = Arc::new(CircuitBreaker::new());
    let mut cfg = RuntimeConfig::default();
    cfg.tools.circuit_open_after_failures = 2;
    cfg.tools.circuit_open_for_ms = 60_000;
    cfg.tools.retry_max = 0;
    let config = Arc::new(cfg);
    let executor = Executor::new(registry, cache, breaker, config);

    let probe = call("widget_probe", "1", serde_json::json!({}));

    // Each call simulates a separate turn against the same persistent
    // breaker — a fresh `RunState` each time, since in-run dedup (keyed on
    // identical args) would otherwise short-circuit the repeat calls this
    // scenario needs to actually reach the tool.
    let first = executor.execute(&probe, &mut RunState::new(false)).await;
    assert!(!first.is_ok());
    let second = executor.execute(&probe, &mut RunState::new(false)).await;
    assert!(!second.is_ok());
    let third = executor.execute(&probe, &mut RunState::new(false)).await;

    assert!(!third.is_ok());
    assert_eq!(third.error.unwrap().kind, household_agent::model::ErrorKind::CircuitOpen);
    assert_eq!(third.attempts, 0);
    assert_eq!(tool.invocations.load(Ordering::SeqCst), 2, "the breaker must block the third invocation outright");
}

/// S4 — write-intent guard: the model tries to answer without calling a
/// tool even though the utterance carries write intent. The loop must
/// refuse that answer, force `tool_choice=required`, and only finalize once
/// the write and its validation read both complete.
#[tokio::test]
async fn s4_write_intent_guard_rejects_a_toolless_answer() {
    let llm = Arc::new(MockLlmClient::new(vec![
        MockLlmClient::text("Sure, I'll get right on that."),
        MockLlmClient::tool_calls(vec![call(
            "radarr_add_movie",
            "1",
            serde_json::json!({"tmdb_id": 603, "quality_profile_id": 1, "root_folder_path": "/m"}),
        )]),
        MockLlmClient::tool_calls(vec![call("radarr_get_movies", "2", serde_json::json!({}))]),
        MockLlmClient::text("Added."),
    ]));
    let agent = agent_loop(RuntimeConfig::default(), llm);
    let outcome = agent.run_turn("add the matrix to radarr", AgentMode::Converse).await;

    assert_eq!(outcome.reply, "Added.");
    assert_eq!(outcome.llm_calls, 4, "the toolless first answer must not have been accepted as final");
    assert_eq!(outcome.tool_calls, 2);
    assert!(!outcome.iteration_budget_exhausted);
}

/// A tmdb-family tool whose first invocation is slow and whose every later
/// invocation is fast, to exercise hedging deterministically.
struct SlowThenFastTmdbTool {
    invocations: AtomicU32,
}

#[async_trait]
impl ToolExecutable for SlowThenFastTmdbTool {
    fn name(&self) -> &str {
        "tmdb_slow_lookup"
    }
    fn description(&self) -> &str {
        "test-only tmdb tool with a slow first attempt"
    }
    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    async fn execute(&self, _call: &ToolCall) -> Result<serde_json::Value, String> {
        let attempt = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == 1 {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        } else {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        Ok(serde_json::json!({"attempt": attempt}))
    }
}

/// S5 — hedging wins: the primary attempt is much slower than the hedge
/// delay, so the secondary attempt finishes first and its (not the
/// primary's) result is what comes back.
#[tokio::test]
async fn s5_hedged_attempt_wins_over_a_slow_primary() {
    let tool = Arc::new(SlowThenFastTmdbTool { invocations: AtomicU32::new(0) });
    let registry = Arc::new(ToolRegistry::new().register(tool.clone()));
    let cache = Arc::new(ResultCache::new());
    let breaker = Arc::new(CircuitBreaker::new());
    let config = Arc::new(RuntimeConfig::default());
    let executor = Executor::new(registry, cache, breaker, config);

    let probe = call("tmdb_slow_lookup", "1", serde_json::json!({}));
    let mut run_state = RunState::new(false);
    let result = executor.execute(&probe, &mut run_state).await;

    assert!(result.is_ok());
    assert_eq!(result.attempts, 1);
    assert_eq!(result.value.unwrap()["attempt"], 2, "the hedged (second) attempt should win the race");
    assert!(result.duration_ms < 480, "hedging should have returned well before the slow primary finished");
}

/// S6 — non-retryable classification: a 401 response is classified
/// `non_retryable`, burns exactly one attempt, and still counts toward the
/// breaker.
#[tokio::test]
async fn s6_unauthorized_is_non_retryable_but_trips_the_breaker() {
    struct UnauthorizedTool;
    #[async_trait]
    impl ToolExecutable for UnauthorizedTool {
        fn name(&self) -> &str {
            "widget_locked"
        }
        fn description(&self) -> &str {
            "test-only tool that always returns 401"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _call: &ToolCall) -> Result<serde_json::Value, String> {
            Err("401 Unauthorized".to_string())
        }
    }

    let registry = Arc::new(ToolRegistry::new().register(Arc::new(UnauthorizedTool)));
    let cache = Arc::new(ResultCache::new());
    let breaker = Arc::new(CircuitBreaker::new());
    let config = Arc::new(RuntimeConfig::default());
    let executor = Executor::new(registry, cache, breaker.clone(), config);

    let probe = call("widget_locked", "1", serde_json::json!({}));
    let mut run_state = RunState::new(false);
    let result = executor.execute(&probe, &mut run_state).await;

    assert!(!result.is_ok());
    assert_eq!(result.attempts, 1);
    assert_eq!(result.error.unwrap().kind, household_agent::model::ErrorKind::NonRetryable);
    assert_eq!(breaker.failure_count("widget_locked"), 1);
}
