//! Stub Plex media-server tools. Read-only.

use super::ToolExecutable;
use crate::model::ToolCall;
use async_trait::async_trait;
use serde_json::json;

#[derive(Clone, Default)]
pub struct PlexSearchTool;

impl PlexSearchTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolExecutable for PlexSearchTool {
    fn name(&self) -> &str {
        "plex_search"
    }

    fn description(&self) -> &str {
        "Search the household's Plex library for movies or shows already owned."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "query": {"type": "string"} },
            "required": ["query"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String> {
        let query = call
            .arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'query' argument".to_string())?;
        // Stub library is intentionally empty — everything searched for is
        // "not yet owned", which is the common case exercised by tests.
        Ok(json!({ "movies": [], "query": query }))
    }
}

#[derive(Clone, Default)]
pub struct PlexGetLibrariesTool;

impl PlexGetLibrariesTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolExecutable for PlexGetLibrariesTool {
    fn name(&self) -> &str {
        "plex_get_libraries"
    }

    fn description(&self) -> &str {
        "List the Plex server's configured libraries."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _call: &ToolCall) -> Result<serde_json::Value, String> {
        Ok(json!({ "libraries": [{"key": "1", "title": "Movies"}, {"key": "2", "title": "TV Shows"}] }))
    }
}
