//! C6 — Result Summarizer.
//!
//! Pure, deterministic shrinking of a `ToolResult`'s JSON value down to what
//! the LLM actually needs to see (§4.6). Idempotent: summarizing an already
//! summarized value returns the same text (§8 invariant — re-running on a
//! stable input must not drift).

use crate::model::ToolResult;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    Minimal,
    Compact,
    Standard,
    Detailed,
}

/// Field allowlist per tool family, one row per detail level (§4.6). `Other`
/// always gets the full value — no allowlist exists for families the spec
/// doesn't name.
fn allowlist(family: &str, level: DetailLevel) -> Option<&'static [&'static str]> {
    match (family, level) {
        ("tmdb", DetailLevel::Minimal) => Some(&["id", "title"]),
        ("tmdb", DetailLevel::Compact) => Some(&["id", "title", "release_date"]),
        ("tmdb", DetailLevel::Standard) => Some(&["id", "title", "release_date", "overview"]),
        ("tmdb", DetailLevel::Detailed) => None,
        ("radarr", DetailLevel::Minimal) => Some(&["id", "title"]),
        ("radarr", DetailLevel::Compact) => Some(&["id", "title", "tmdbId"]),
        ("radarr", DetailLevel::Standard) => Some(&["id", "title", "tmdbId", "already_exists"]),
        ("radarr", DetailLevel::Detailed) => None,
        ("sonarr", DetailLevel::Minimal) => Some(&["id", "title"]),
        ("sonarr", DetailLevel::Compact) => Some(&["id", "title", "tvdbId"]),
        ("sonarr", DetailLevel::Standard) => Some(&["id", "title", "tvdbId", "already_exists"]),
        ("sonarr", DetailLevel::Detailed) => None,
        _ => None,
    }
}

fn pick_fields(value: &Value, fields: &[&str]) -> Value {
    match value.as_object() {
        Some(obj) => {
            let mut out = serde_json::Map::new();
            for field in fields {
                if let Some(v) = obj.get(*field) {
                    out.insert((*field).to_string(), v.clone());
                }
            }
            Value::Object(out)
        }
        None => value.clone(),
    }
}

fn shrink_item(family: &str, level: DetailLevel, item: &Value) -> Value {
    match allowlist(family, level) {
        Some(fields) => pick_fields(item, fields),
        None => item.clone(),
    }
}

/// The `{ref_id, summary}` shape sent back to the LLM in place of a full
/// tool result (§4.6, §8 invariant 5).
#[derive(Debug, Clone)]
pub struct Summary {
    pub ref_id: Option<String>,
    pub text: String,
}

impl Summary {
    /// Render the actual `{ref_id, summary}` envelope the tool message
    /// carries to the LLM (§4.2, §4.6): `ref_id` is `null` when there's
    /// nothing to fetch back (errors, "no result"). `summary` is nested as
    /// structured JSON when `text` parses as such, falling back to a plain
    /// string for the handful of callers (error/no-result) that don't.
    pub fn to_message_text(&self) -> String {
        let summary_value: Value =
            serde_json::from_str(&self.text).unwrap_or_else(|_| Value::String(self.text.clone()));
        serde_json::json!({ "ref_id": self.ref_id, "summary": summary_value }).to_string()
    }
}

/// Summarize a successful `ToolResult`'s value for the given family/level.
/// Lists with at most `escape_hatch_max` items (default 2, §4.6) bypass
/// truncation and field-dropping entirely — short enough to show in full.
pub fn summarize(
    family: &str,
    level: DetailLevel,
    value: &Value,
    max_items: usize,
    ref_id: Option<String>,
) -> Summary {
    let escape_hatch_max = 2;

    // Common shapes: a top-level array, or a single `{"<plural>": [...]}`
    // envelope (as radarr_get_movies/tmdb_search return).
    let list_field = value.as_object().and_then(|obj| {
        obj.iter().find_map(|(k, v)| v.as_array().map(|arr| (k.clone(), arr.clone())))
    });

    let (list, wrapper_key) = match (&value, &list_field) {
        (Value::Array(arr), _) => (Some(arr.clone()), None),
        (_, Some((key, arr))) => (Some(arr.clone()), Some(key.clone())),
        _ => (None, None),
    };

    let text = if let Some(items) = list {
        let total = items.len();
        let shrunk: Vec<Value> = if total <= escape_hatch_max {
            items.iter().map(|i| shrink_item(family, level, i)).collect()
        } else {
            items.iter().take(max_items).map(|i| shrink_item(family, level, i)).collect()
        };
        let truncated = total > max_items && total > escape_hatch_max;
        let body = match wrapper_key {
            Some(key) => serde_json::json!({ key: shrunk }),
            None => Value::Array(shrunk),
        };
        if truncated {
            format!("{body} (showing {} of {total})", shrunk.len())
        } else {
            body.to_string()
        }
    } else {
        shrink_item(family, level, value).to_string()
    };

    Summary { ref_id, text }
}

/// Summarize a `ToolResult`, choosing `detailed` for errors (so the LLM sees
/// the full diagnostic) and `level` for success (§4.6).
pub fn summarize_result(result: &ToolResult, family: &str, level: DetailLevel, max_items: usize) -> Summary {
    match (&result.value, &result.error) {
        (Some(value), _) => summarize(family, level, value, max_items, result.ref_id.clone()),
        (None, Some(err)) => Summary { ref_id: None, text: format!("error ({:?}): {}", err.kind, err.message) },
        (None, None) => Summary { ref_id: None, text: "no result".to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_drops_unlisted_fields() {
        let value = json!({"id": 603, "title": "The Matrix", "overview": "long text"});
        let summary = summarize("tmdb", DetailLevel::Minimal, &value, 5, None);
        assert!(summary.text.contains("603"));
        assert!(!summary.text.contains("long text"));
    }

    #[test]
    fn truncates_lists_beyond_max_items() {
        let items: Vec<Value> = (0..10).map(|i| json!({"id": i, "title": format!("item {i}")})).collect();
        let value = json!({"movies": items});
        let summary = summarize("radarr", DetailLevel::Compact, &value, 5, None);
        assert!(summary.text.contains("showing 5 of 10"));
    }

    #[test]
    fn escape_hatch_skips_truncation_for_short_lists() {
        let items: Vec<Value> = (0..2).map(|i| json!({"id": i, "title": format!("item {i}")})).collect();
        let value = json!({"movies": items});
        let summary = summarize("radarr", DetailLevel::Minimal, &value, 1, None);
        assert!(!summary.text.contains("showing"));
    }

    #[test]
    fn detailed_level_keeps_all_fields() {
        let value = json!({"id": 603, "title": "The Matrix", "overview": "long text"});
        let summary = summarize("tmdb", DetailLevel::Detailed, &value, 5, None);
        assert!(summary.text.contains("long text"));
    }

    #[test]
    fn summarizing_twice_is_idempotent() {
        let value = json!({"id": 603, "title": "The Matrix", "overview": "long text"});
        let first = summarize("tmdb", DetailLevel::Minimal, &value, 5, None);
        let reparsed: Value = serde_json::from_str(&first.text).unwrap();
        let second = summarize("tmdb", DetailLevel::Minimal, &reparsed, 5, None);
        assert_eq!(first.text, second.text);
    }
}
