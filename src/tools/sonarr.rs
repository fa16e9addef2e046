//! Stub Sonarr (TV download manager) tools. Mirrors `radarr.rs`.

use super::ToolExecutable;
use crate::model::ToolCall;
use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct QueuedSeries {
    id: i64,
    tvdb_id: i64,
    title: String,
}

type Store = Arc<Mutex<Vec<QueuedSeries>>>;

const CATALOG_TITLES: &[(i64, &str)] = &[(81189, "Breaking Bad"), (1396, "The Wire")];

/// Build a (`sonarr_add_series`, `sonarr_get_series`) pair sharing one store.
pub fn sonarr_tools() -> (SonarrAddSeriesTool, SonarrGetSeriesTool) {
    let store: Store = Arc::new(Mutex::new(Vec::new()));
    (
        SonarrAddSeriesTool { store: store.clone() },
        SonarrGetSeriesTool { store },
    )
}

pub struct SonarrAddSeriesTool {
    store: Store,
}

#[async_trait]
impl ToolExecutable for SonarrAddSeriesTool {
    fn name(&self) -> &str {
        "sonarr_add_series"
    }

    fn description(&self) -> &str {
        "Add a show to Sonarr by TVDb id so it gets downloaded and monitored."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "tvdb_id": {"type": "integer"},
                "quality_profile_id": {"type": "integer"},
                "root_folder_path": {"type": "string"}
            },
            "required": ["tvdb_id", "quality_profile_id", "root_folder_path"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String> {
        let tvdb_id = call
            .arguments
            .get("tvdb_id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| "missing 'tvdb_id' argument".to_string())?;

        let mut store = self.store.lock().unwrap();
        if let Some(existing) = store.iter().find(|s| s.tvdb_id == tvdb_id) {
            return Ok(json!({
                "id": existing.id,
                "title": existing.title,
                "tvdbId": existing.tvdb_id,
                "already_exists": true,
            }));
        }

        let title = CATALOG_TITLES
            .iter()
            .find(|(id, _)| *id == tvdb_id)
            .map(|(_, title)| *title)
            .unwrap_or("Unknown Title")
            .to_string();
        let id = store.len() as i64 + 1;
        store.push(QueuedSeries { id, tvdb_id, title: title.clone() });

        Ok(json!({ "id": id, "title": title, "tvdbId": tvdb_id }))
    }
}

pub struct SonarrGetSeriesTool {
    store: Store,
}

#[async_trait]
impl ToolExecutable for SonarrGetSeriesTool {
    fn name(&self) -> &str {
        "sonarr_get_series"
    }

    fn description(&self) -> &str {
        "List shows currently tracked by Sonarr."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _call: &ToolCall) -> Result<serde_json::Value, String> {
        let store = self.store.lock().unwrap();
        let series: Vec<_> = store
            .iter()
            .map(|s| json!({"id": s.id, "title": s.title, "tvdbId": s.tvdb_id}))
            .collect();
        Ok(json!({ "series": series }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            call_id: "c1".to_string(),
            tool_name: "sonarr_add_series".to_string(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn add_then_get_reflects_addition() {
        let (add, get) = sonarr_tools();
        let added = add
            .execute(&call(json!({"tvdb_id": 81189, "quality_profile_id": 1, "root_folder_path": "/tv"})))
            .await
            .unwrap();
        assert_eq!(added["title"], "Breaking Bad");

        let listed = get.execute(&call(json!({}))).await.unwrap();
        let series = listed["series"].as_array().unwrap();
        assert_eq!(series.len(), 1);
    }
}
