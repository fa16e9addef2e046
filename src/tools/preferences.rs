//! Household-preferences JSON store (§6 "Preferences store (consumed by
//! specific tools, not the core)"). The core only ever touches this through
//! `PreferencesGetTool`/`PreferencesUpdateTool`; it never reads the file
//! itself.

use super::ToolExecutable;
use crate::model::ToolCall;
use async_trait::async_trait;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Mutex;

const DEFAULT_PATH: &str = "preferences.json";

fn read_store(path: &PathBuf) -> serde_json::Value {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_else(|| json!({}))
}

fn write_store(path: &PathBuf, value: &serde_json::Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    std::fs::write(path, text).map_err(|e| format!("writing {}: {e}", path.display()))
}

pub struct PreferencesGetTool {
    path: Mutex<PathBuf>,
}

impl PreferencesGetTool {
    pub fn new() -> Self {
        Self { path: Mutex::new(PathBuf::from(DEFAULT_PATH)) }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: Mutex::new(path.into()) }
    }
}

impl Default for PreferencesGetTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutable for PreferencesGetTool {
    fn name(&self) -> &str {
        "preferences_get"
    }

    fn description(&self) -> &str {
        "Read the household's stored media preferences (ratings, favorite genres, watchlist notes)."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _call: &ToolCall) -> Result<serde_json::Value, String> {
        let path = self.path.lock().unwrap().clone();
        Ok(read_store(&path))
    }
}

pub struct PreferencesUpdateTool {
    path: Mutex<PathBuf>,
}

impl PreferencesUpdateTool {
    pub fn new() -> Self {
        Self { path: Mutex::new(PathBuf::from(DEFAULT_PATH)) }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: Mutex::new(path.into()) }
    }
}

impl Default for PreferencesUpdateTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutable for PreferencesUpdateTool {
    fn name(&self) -> &str {
        "preferences_update"
    }

    fn description(&self) -> &str {
        "Merge a key/value update into the household's stored media preferences."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "key": {"type": "string"},
                "value": {}
            },
            "required": ["key", "value"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String> {
        let key = call
            .arguments
            .get("key")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'key' argument".to_string())?;
        let value = call
            .arguments
            .get("value")
            .cloned()
            .ok_or_else(|| "missing 'value' argument".to_string())?;

        let path = self.path.lock().unwrap().clone();
        let mut store = read_store(&path);
        store
            .as_object_mut()
            .ok_or_else(|| "preferences store corrupted (not a JSON object)".to_string())?
            .insert(key.to_string(), value);
        write_store(&path, &store)?;
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            call_id: "c1".to_string(),
            tool_name: "preferences_update".to_string(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn update_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        let update = PreferencesUpdateTool::with_path(&path);
        let get = PreferencesGetTool::with_path(&path);

        update
            .execute(&call(json!({"key": "favorite_genre", "value": "sci-fi"})))
            .await
            .unwrap();

        let read_back = get.execute(&call(json!({}))).await.unwrap();
        assert_eq!(read_back["favorite_genre"], "sci-fi");
    }
}
