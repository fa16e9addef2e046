//! C8 — Finalization Gate.
//!
//! Decides whether the agent loop is allowed to stop calling tools and
//! produce a final answer this turn (§4.8). Every override rule here exists
//! to prevent the loop from declaring success before a write — or the write's
//! validation — has actually landed.

use crate::model::{RunState, ToolResult};

/// §4.8 base predicate: "no results errored and at least one result has
/// non-empty content" — a list-shaped field with at least one element, or a
/// non-empty scalar/object value. An all-empty batch (e.g. a search that
/// found nothing) must not look finalizable just because nothing errored.
///
/// Mirrors `summarizer::summarize`'s own "find the first array-valued field,
/// else take the whole value" shape rather than a fixed field allowlist — a
/// tool's envelope key (`libraries`, `movies`, `results`, ...) shouldn't have
/// to be named twice.
fn has_non_empty_content(results: &[ToolResult]) -> bool {
    results.iter().any(|r| {
        let Some(value) = r.value.as_ref() else { return false };
        match value {
            serde_json::Value::Null => false,
            serde_json::Value::Array(arr) => !arr.is_empty(),
            serde_json::Value::Object(obj) => match obj.values().find_map(|v| v.as_array()) {
                Some(arr) => !arr.is_empty(),
                None => !obj.is_empty(),
            },
            _ => true,
        }
    })
}

/// §4.8: the gate is a conjunction of overrides, any one of which blocks
/// finalization regardless of what the LLM wants to do next.
pub fn finalizable(run_state: &RunState, latest_results: &[ToolResult]) -> bool {
    let write_just_succeeded = latest_results
        .iter()
        .any(|r| r.is_ok() && crate::tools::is_write_style(&r.tool_name));
    if write_just_succeeded {
        return false;
    }

    if run_state.must_write && !run_state.write_completed {
        return false;
    }

    if run_state.seen_write_intent && !run_state.write_completed {
        return false;
    }

    if latest_results.iter().any(|r| !r.is_ok()) {
        return false;
    }

    has_non_empty_content(latest_results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ErrorKind, Outcome, ToolError};

    fn ok_result(tool_name: &str) -> ToolResult {
        ok_result_with_value(tool_name, serde_json::json!({"results": [{"id": 603}]}))
    }

    fn ok_result_with_value(tool_name: &str, value: serde_json::Value) -> ToolResult {
        ToolResult {
            call_id: "1".to_string(),
            tool_name: tool_name.to_string(),
            outcome: Outcome::Ok,
            value: Some(value),
            error: None,
            attempts: 1,
            duration_ms: 0,
            cache_hit: false,
            ref_id: None,
        }
    }

    fn err_result(tool_name: &str) -> ToolResult {
        ToolResult {
            call_id: "1".to_string(),
            tool_name: tool_name.to_string(),
            outcome: Outcome::Error,
            value: None,
            error: Some(ToolError { kind: ErrorKind::Retryable, message: "boom".to_string() }),
            attempts: 1,
            duration_ms: 0,
            cache_hit: false,
            ref_id: None,
        }
    }

    #[test]
    fn blocks_immediately_after_a_successful_write() {
        let run_state = RunState::new(false);
        assert!(!finalizable(&run_state, &[ok_result("radarr_add_movie")]));
    }

    #[test]
    fn blocks_when_must_write_and_not_completed() {
        let run_state = RunState::new(true);
        assert!(!finalizable(&run_state, &[ok_result("tmdb_search")]));
    }

    #[test]
    fn blocks_when_write_intent_seen_but_no_write_yet() {
        let mut run_state = RunState::new(false);
        run_state.seen_write_intent = true;
        assert!(!finalizable(&run_state, &[ok_result("tmdb_search")]));
    }

    #[test]
    fn blocks_on_any_error() {
        let run_state = RunState::new(false);
        assert!(!finalizable(&run_state, &[err_result("tmdb_search")]));
    }

    #[test]
    fn allows_finalization_once_write_completed_and_reads_clean() {
        let mut run_state = RunState::new(true);
        run_state.write_completed = true;
        assert!(finalizable(&run_state, &[ok_result("tmdb_search")]));
    }

    #[test]
    fn blocks_when_every_list_field_is_empty() {
        let run_state = RunState::new(false);
        let empty = ok_result_with_value("tmdb_search", serde_json::json!({"results": []}));
        assert!(!finalizable(&run_state, &[empty]));
    }

    #[test]
    fn allows_finalization_on_a_non_object_scalar_result() {
        let run_state = RunState::new(false);
        let scalar = ok_result_with_value("plex_get_libraries", serde_json::json!("ok"));
        assert!(finalizable(&run_state, &[scalar]));
    }

    #[test]
    fn finds_content_in_any_array_field_not_just_a_fixed_allowlist() {
        let run_state = RunState::new(false);
        let libraries = ok_result_with_value(
            "plex_get_libraries",
            serde_json::json!({"libraries": [{"key": "1", "title": "Movies"}]}),
        );
        assert!(finalizable(&run_state, &[libraries]));
    }

    #[test]
    fn allows_finalization_on_a_non_empty_object_with_no_array_field() {
        let run_state = RunState::new(false);
        let details = ok_result_with_value("tmdb_get_details", serde_json::json!({"id": 603, "title": "The Matrix"}));
        assert!(finalizable(&run_state, &[details]));
    }
}
