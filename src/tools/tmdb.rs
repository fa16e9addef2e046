//! Stub TMDb metadata tools. Read-only — eligible for hedging (§4.4).

use super::ToolExecutable;
use crate::model::ToolCall;
use async_trait::async_trait;
use serde_json::json;

struct CatalogEntry {
    id: i64,
    title: &'static str,
    year: u32,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry { id: 603, title: "The Matrix", year: 1999 },
    CatalogEntry { id: 27205, title: "Inception", year: 2010 },
    CatalogEntry { id: 155, title: "The Dark Knight", year: 2008 },
];

#[derive(Clone, Default)]
pub struct TmdbSearchTool;

impl TmdbSearchTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolExecutable for TmdbSearchTool {
    fn name(&self) -> &str {
        "tmdb_search"
    }

    fn description(&self) -> &str {
        "Search TMDb for a movie or show by title, optionally constrained by year."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Title to search for."},
                "year": {"type": "integer", "description": "Optional release year filter."}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String> {
        let query = call
            .arguments
            .get("query")
            .or_else(|| call.arguments.get("q"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'query' argument".to_string())?;
        let year = call.arguments.get("year").and_then(|v| v.as_i64());

        let needle = query.trim().to_ascii_lowercase();
        let results: Vec<_> = CATALOG
            .iter()
            .filter(|entry| {
                entry.title.to_ascii_lowercase().contains(&needle)
                    && year.map(|y| y as u32 == entry.year).unwrap_or(true)
            })
            .map(|entry| json!({"id": entry.id, "title": entry.title, "year": entry.year}))
            .collect();

        Ok(json!({ "results": results }))
    }
}

#[derive(Clone, Default)]
pub struct TmdbGetDetailsTool;

impl TmdbGetDetailsTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolExecutable for TmdbGetDetailsTool {
    fn name(&self) -> &str {
        "tmdb_get_details"
    }

    fn description(&self) -> &str {
        "Fetch full TMDb details for a movie by id."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "tmdb_id": {"type": "integer"} },
            "required": ["tmdb_id"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String> {
        let tmdb_id = call
            .arguments
            .get("tmdb_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| "missing 'tmdb_id' argument".to_string())?;

        CATALOG
            .iter()
            .find(|entry| entry.id == tmdb_id)
            .map(|entry| json!({"id": entry.id, "title": entry.title, "year": entry.year}))
            .ok_or_else(|| format!("no such tmdb id: {tmdb_id}"))
    }
}
