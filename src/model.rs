//! Core data model (§3): `ToolCall`, `ToolResult`, `CachedResult`,
//! `CircuitState`, `Message`, and `RunState`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// A structured tool invocation requested by the LLM.
///
/// Invariant: `tool_name` must resolve in the registry before dispatch;
/// the registry is consulted for that, not enforced by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// Why a tool invocation did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidJson,
    Timeout,
    CircuitOpen,
    NonRetryable,
    RateLimited,
    Retryable,
}

impl ErrorKind {
    /// Whether this kind should increment the tool's circuit-breaker failure
    /// counter (§4.3: both `non_retryable` and `rate_limited` count; `timeout`
    /// counts; `invalid_json` and `circuit_open` never reach the breaker).
    pub fn counts_toward_breaker(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::NonRetryable | ErrorKind::RateLimited | ErrorKind::Retryable
        )
    }

    /// Whether the executor should attempt another retry after this kind,
    /// given attempts remain (§4.4 step 4d, §7 table — `rate_limited` is
    /// explicitly "No (within call)": the breaker still trips, but the
    /// executor does not burn its own retry budget hammering a 429/503).
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Retryable | ErrorKind::Timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Error,
}

/// The materialized result of executing (or deduping / short-circuiting) a
/// single `ToolCall`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub outcome: Outcome,
    pub value: Option<serde_json::Value>,
    pub error: Option<ToolError>,
    /// `>= 1` on any materialized attempt; `0` on dedup hits (§8 invariant 6).
    pub attempts: u32,
    pub duration_ms: u64,
    pub cache_hit: bool,
    pub ref_id: Option<String>,
}

impl ToolResult {
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }
}

/// Stored cross-run cache entry, keyed by a canonicalized `(tool_name, args)`
/// hash. Mutating tools are never written here (§4.2).
#[derive(Debug, Clone)]
pub struct CachedResult {
    pub value: serde_json::Value,
    pub stored_at: Instant,
    pub ttl_secs: u64,
}

impl CachedResult {
    pub fn is_expired(&self) -> bool {
        self.stored_at.elapsed().as_secs() >= self.ttl_secs
    }
}

/// Per-tool circuit-breaker bookkeeping (§3, §4.3).
#[derive(Debug, Clone)]
pub struct CircuitState {
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            failure_count: 0,
            last_failure: None,
        }
    }
}

impl CircuitState {
    pub fn is_open(&self, open_threshold: u32, cooldown_ms: u64) -> bool {
        if self.failure_count < open_threshold {
            return false;
        }
        match self.last_failure {
            Some(t) => t.elapsed().as_millis() < cooldown_ms as u128,
            None => false,
        }
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
        self.last_failure = None;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure = Some(Instant::now());
    }
}

/// Conversation roles, matching the LLM wire protocol (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single entry in the conversation sent to/received from the LLM.
///
/// Invariant (§3, §8 invariant 1): every assistant message that declares
/// `tool_calls` must be immediately followed by one tool message per
/// declared call, in the same order, before the next assistant turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// The tool-choice directive sent with the next LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    Required,
    None,
}

/// Write identity recorded after a successful write, used to check the
/// subsequent validation read (§3, §9 Open Question).
#[derive(Debug, Clone, Default)]
pub struct WriteIdentity {
    pub tmdb_id: Option<i64>,
    pub title: Option<String>,
}

/// Per-turn state, owned exclusively by the Agent Loop (§3, §5). Never
/// persisted — `run_id` exists only to correlate this run's progress/audit
/// log lines, not to resume or replay a run later (Non-goal).
pub struct RunState {
    pub run_id: String,
    pub iter_index: u32,
    pub write_phase_allowed: bool,
    pub require_validation_read: bool,
    pub write_completed: bool,
    pub seen_write_intent: bool,
    pub validation_done: bool,
    pub must_write: bool,
    pub force_finalize_next: bool,
    pub next_tool_choice_override: Option<ToolChoice>,
    pub last_write_identity: Option<WriteIdentity>,
    pub dedup_cache: HashMap<String, ToolResult>,
    pub llm_call_count: u32,
    pub tool_call_count: u32,
    pub started_at: Instant,
}

impl RunState {
    pub fn new(must_write: bool) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            iter_index: 0,
            write_phase_allowed: false,
            require_validation_read: false,
            write_completed: false,
            seen_write_intent: false,
            validation_done: false,
            must_write,
            force_finalize_next: false,
            next_tool_choice_override: None,
            last_write_identity: None,
            dedup_cache: HashMap::new(),
            llm_call_count: 0,
            tool_call_count: 0,
            started_at: Instant::now(),
        }
    }
}
