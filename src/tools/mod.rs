//! Tool implementations (external collaborators per spec §1 — only stub
//! adapters live here; real HTTP integration to Plex/Radarr/Sonarr/TMDb is
//! out of scope). Each tool implements [`ToolExecutable`] and is wired into
//! the [`crate::registry::ToolRegistry`] by [`all_tools`].

pub mod detail;
pub mod plex;
pub mod preferences;
pub mod radarr;
pub mod sonarr;
pub mod tmdb;

use crate::model::ToolCall;
use async_trait::async_trait;
use std::sync::Arc;

/// A single executable tool, analogous to the teacher's `BashTool`/
/// `EditorEditTool` pair but behind a trait object so the registry can hold
/// a heterogeneous set (§6 "Tool executable (consumed)").
#[async_trait]
pub trait ToolExecutable: Send + Sync {
    /// Stable name matching the registry key and the name the LLM sees.
    fn name(&self) -> &str;

    /// Brief, always-sent description.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments.
    fn parameters(&self) -> serde_json::Value;

    /// Execute with already-parsed arguments. Must raise (`Err`) with a
    /// textual error on failure — classification and timeouts are imposed
    /// externally by the executor (§6).
    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String>;
}

/// Family grouping used for batching/tuning (§4.1, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Tmdb,
    Plex,
    Radarr,
    Sonarr,
    Other,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Tmdb => "tmdb",
            Family::Plex => "plex",
            Family::Radarr => "radarr",
            Family::Sonarr => "sonarr",
            Family::Other => "other",
        }
    }
}

/// Classify a tool by name prefix (§4.1).
pub fn classify_family(tool_name: &str) -> Family {
    let n = tool_name.to_ascii_lowercase();
    if n.starts_with("tmdb_") {
        Family::Tmdb
    } else if n.starts_with("plex_") {
        Family::Plex
    } else if n.starts_with("radarr_") {
        Family::Radarr
    } else if n.starts_with("sonarr_") {
        Family::Sonarr
    } else {
        Family::Other
    }
}

/// A tool is "write-style" iff its name contains a mutating verb, or is an
/// explicit mutator (the preferences-update tool) (§4.4).
pub fn is_write_style(tool_name: &str) -> bool {
    const MUTATING_SUBSTRINGS: &[&str] = &[
        "add", "update", "delete", "monitor", "set_", "create", "remove",
    ];
    let n = tool_name.to_ascii_lowercase();
    n == "preferences_update" || MUTATING_SUBSTRINGS.iter().any(|m| n.contains(m))
}

/// All built-in stub tools, ready to register. Radarr/Sonarr add+get pairs
/// share one in-memory store each, as they would against a real backend.
/// Takes the result cache so `fetch_result_detail` can resolve the ref_ids
/// the summarizer hands out (§4.6).
pub fn all_tools(cache: Arc<crate::cache::ResultCache>) -> Vec<Arc<dyn ToolExecutable>> {
    let (radarr_add, radarr_get) = radarr::radarr_tools();
    let (sonarr_add, sonarr_get) = sonarr::sonarr_tools();
    vec![
        Arc::new(tmdb::TmdbSearchTool::new()),
        Arc::new(tmdb::TmdbGetDetailsTool::new()),
        Arc::new(plex::PlexSearchTool::new()),
        Arc::new(plex::PlexGetLibrariesTool::new()),
        Arc::new(radarr_add),
        Arc::new(radarr_get),
        Arc::new(sonarr_add),
        Arc::new(sonarr_get),
        Arc::new(preferences::PreferencesGetTool::new()),
        Arc::new(preferences::PreferencesUpdateTool::new()),
        Arc::new(detail::FetchResultDetailTool::new(cache)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_prefix() {
        assert_eq!(classify_family("tmdb_search").as_str(), "tmdb");
        assert_eq!(classify_family("radarr_add_movie").as_str(), "radarr");
        assert_eq!(classify_family("sonarr_get_series").as_str(), "sonarr");
        assert_eq!(classify_family("plex_search").as_str(), "plex");
        assert_eq!(classify_family("anything_else").as_str(), "other");
    }

    #[test]
    fn write_style_detection() {
        assert!(is_write_style("radarr_add_movie"));
        assert!(is_write_style("sonarr_monitor_series"));
        assert!(is_write_style("preferences_update"));
        assert!(!is_write_style("tmdb_search"));
        assert!(!is_write_style("radarr_get_movies"));
    }
}
