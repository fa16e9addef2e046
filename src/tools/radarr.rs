//! Stub Radarr (movie download manager) tools.
//!
//! `radarr_add_movie` is write-style; `radarr_get_movies` is the read used
//! for the validation turn that follows a successful add (§4.7 Phase V).
//! Both share one backing store, the way Radarr's own endpoints share one
//! library — see [`radarr_tools`].

use super::ToolExecutable;
use crate::model::ToolCall;
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct QueuedMovie {
    id: i64,
    tmdb_id: i64,
    title: String,
}

type Store = Arc<Mutex<Vec<QueuedMovie>>>;

const CATALOG_TITLES: &[(i64, &str)] = &[
    (603, "The Matrix"),
    (27205, "Inception"),
    (155, "The Dark Knight"),
];

/// Build a (`radarr_add_movie`, `radarr_get_movies`) pair sharing one store.
pub fn radarr_tools() -> (RadarrAddMovieTool, RadarrGetMoviesTool) {
    let store: Store = Arc::new(Mutex::new(Vec::new()));
    (
        RadarrAddMovieTool { store: store.clone() },
        RadarrGetMoviesTool { store },
    )
}

pub struct RadarrAddMovieTool {
    store: Store,
}

#[async_trait]
impl ToolExecutable for RadarrAddMovieTool {
    fn name(&self) -> &str {
        "radarr_add_movie"
    }

    fn description(&self) -> &str {
        "Add a movie to Radarr by TMDb id so it gets downloaded and monitored."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "tmdb_id": {"type": "integer"},
                "quality_profile_id": {"type": "integer"},
                "root_folder_path": {"type": "string"}
            },
            "required": ["tmdb_id", "quality_profile_id", "root_folder_path"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String> {
        let tmdb_id = call
            .arguments
            .get("tmdb_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| "missing 'tmdb_id' argument".to_string())?;

        let mut store = self.store.lock().unwrap();
        if let Some(existing) = store.iter().find(|m| m.tmdb_id == tmdb_id) {
            // "Already exists" is treated as success by this adapter (§9 Open
            // Question): upgrade what Radarr reports as a conflict error into
            // an ok ToolResult annotated with `already_exists`.
            return Ok(json!({
                "id": existing.id,
                "title": existing.title,
                "tmdbId": existing.tmdb_id,
                "already_exists": true,
            }));
        }

        let title = CATALOG_TITLES
            .iter()
            .find(|(id, _)| *id == tmdb_id)
            .map(|(_, title)| *title)
            .unwrap_or("Unknown Title")
            .to_string();
        let id = store.len() as i64 + 1;
        store.push(QueuedMovie { id, tmdb_id, title: title.clone() });

        Ok(json!({ "id": id, "title": title, "tmdbId": tmdb_id }))
    }
}

pub struct RadarrGetMoviesTool {
    store: Store,
}

#[async_trait]
impl ToolExecutable for RadarrGetMoviesTool {
    fn name(&self) -> &str {
        "radarr_get_movies"
    }

    fn description(&self) -> &str {
        "List movies currently tracked by Radarr."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _call: &ToolCall) -> Result<serde_json::Value, String> {
        let store = self.store.lock().unwrap();
        let movies: Vec<_> = store
            .iter()
            .map(|m| json!({"id": m.id, "title": m.title, "tmdbId": m.tmdb_id}))
            .collect();
        Ok(json!({ "movies": movies }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            call_id: "c1".to_string(),
            tool_name: "radarr_add_movie".to_string(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn add_then_get_reflects_addition() {
        let (add, get) = radarr_tools();
        let added = add
            .execute(&call(json!({"tmdb_id": 603, "quality_profile_id": 1, "root_folder_path": "/m"})))
            .await
            .unwrap();
        assert_eq!(added["title"], "The Matrix");

        let listed = get.execute(&call(json!({}))).await.unwrap();
        let movies = listed["movies"].as_array().unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0]["tmdbId"], 603);
    }

    #[tokio::test]
    async fn re_adding_upgrades_to_already_exists_success() {
        let (add, _get) = radarr_tools();
        let args = json!({"tmdb_id": 603, "quality_profile_id": 1, "root_folder_path": "/m"});
        add.execute(&call(args.clone())).await.unwrap();
        let second = add.execute(&call(args)).await.unwrap();
        assert_eq!(second["already_exists"], true);
    }
}
