//! Detail-fetch tool bridging a summarized `ref_id` back to the full value
//! it stands in for (§4.2, §4.6 — "LLM can request fuller detail by
//! invoking a subsequent detail-fetch tool with ref_id").

use super::ToolExecutable;
use crate::cache::ResultCache;
use crate::model::ToolCall;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct FetchResultDetailTool {
    cache: Arc<ResultCache>,
}

impl FetchResultDetailTool {
    pub fn new(cache: Arc<ResultCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl ToolExecutable for FetchResultDetailTool {
    fn name(&self) -> &str {
        "fetch_result_detail"
    }

    fn description(&self) -> &str {
        "Fetch the full, untruncated result behind a ref_id from an earlier tool summary."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": { "ref_id": {"type": "string"} },
            "required": ["ref_id"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String> {
        let ref_id = call
            .arguments
            .get("ref_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'ref_id' argument".to_string())?;

        self.cache
            .resolve_full_result(ref_id)
            .ok_or_else(|| format!("no stored result for ref_id {ref_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(ref_id: &str) -> ToolCall {
        ToolCall { call_id: "c1".to_string(), tool_name: "fetch_result_detail".to_string(), arguments: json!({"ref_id": ref_id}) }
    }

    #[tokio::test]
    async fn resolves_a_previously_stored_result() {
        let cache = Arc::new(ResultCache::new());
        let ref_id = cache.store_full_result(json!({"big": "payload"}));
        let tool = FetchResultDetailTool::new(cache);
        let result = tool.execute(&call(&ref_id)).await.unwrap();
        assert_eq!(result, json!({"big": "payload"}));
    }

    #[tokio::test]
    async fn unknown_ref_id_errors() {
        let cache = Arc::new(ResultCache::new());
        let tool = FetchResultDetailTool::new(cache);
        let err = tool.execute(&call("ref-999")).await.unwrap_err();
        assert!(err.contains("ref-999"));
    }
}
