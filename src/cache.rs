//! C2 — Result Cache & Dedup.
//!
//! Two distinct maps, as spec §4.2 requires: a process-global cross-run
//! cache with per-family TTL, and a per-run dedup map owned by `RunState`
//! (see `model.rs`) that is discarded when the run ends. A third map, the
//! "full results" store, holds the complete value addressable by an opaque
//! `ref_id` so the summarizer can drop detail from what the LLM sees
//! without losing the ability to fetch it back.

use crate::model::{CachedResult, ToolResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Canonicalize arguments for a stable dedup/cache key: deep-sort map keys,
/// and lowercase+trim common query-like string fields (§4.2). Canonicalizing
/// is dedup-only — the original argument casing is still what gets sent to
/// the tool.
pub fn canonicalize_args(tool_name: &str, args: &serde_json::Value) -> String {
    let normalized = normalize_value(args);
    format!("{tool_name}:{normalized}")
}

fn normalize_value(value: &serde_json::Value) -> serde_json::Value {
    const QUERY_LIKE_FIELDS: &[&str] = &["query", "q", "title", "name"];
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                let normalized_v = if QUERY_LIKE_FIELDS.contains(&k.as_str()) {
                    match v.as_str() {
                        Some(s) => serde_json::Value::String(s.trim().to_ascii_lowercase()),
                        None => normalize_value(v),
                    }
                } else {
                    normalize_value(v)
                };
                out.insert(k.clone(), normalized_v);
            }
            serde_json::Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Process-global, shared across runs (§5 "Cross-run cache: concurrent map").
pub struct ResultCache {
    entries: Mutex<HashMap<String, CachedResult>>,
    full_results: Mutex<HashMap<String, serde_json::Value>>,
    next_ref_id: std::sync::atomic::AtomicU64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            full_results: Mutex::new(HashMap::new()),
            next_ref_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a cross-run cache entry. Mutating tools must never be passed
    /// here (the caller is responsible for that check, per §4.2).
    pub fn put(&self, key: String, value: serde_json::Value, ttl_secs: u64) {
        self.entries.lock().unwrap().insert(
            key,
            CachedResult { value, stored_at: std::time::Instant::now(), ttl_secs },
        );
    }

    /// Commit a full result to the opaque-ref-id store and return the id.
    /// The summary alone is never load-bearing for later retrieval (§4.2).
    pub fn store_full_result(&self, value: serde_json::Value) -> String {
        let id = self.next_ref_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let ref_id = format!("ref-{id}");
        self.full_results.lock().unwrap().insert(ref_id.clone(), value);
        ref_id
    }

    /// Resolve a `ref_id` back to its full value (§8 invariant 5).
    pub fn resolve_full_result(&self, ref_id: &str) -> Option<serde_json::Value> {
        self.full_results.lock().unwrap().get(ref_id).cloned()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

/// In-run dedup against `dedup_cache` (owned by `RunState`, single writer,
/// no locking needed per §5). Returns the cached `ToolResult` (reshaped with
/// `cache_hit=true, attempts=0`) on a hit.
pub fn dedup_lookup(dedup_cache: &HashMap<String, ToolResult>, key: &str) -> Option<ToolResult> {
    dedup_cache.get(key).map(|cached| ToolResult {
        call_id: cached.call_id.clone(),
        tool_name: cached.tool_name.clone(),
        outcome: cached.outcome,
        value: cached.value.clone(),
        error: cached.error.clone(),
        attempts: 0,
        duration_ms: cached.duration_ms,
        cache_hit: true,
        ref_id: cached.ref_id.clone(),
    })
}
