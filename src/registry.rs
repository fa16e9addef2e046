//! C1 — Tool Registry.
//!
//! Immutable mapping from tool name to executable, plus the LLM-visible
//! schema catalog. A small variant layer lets a late-bound, LLM-requiring
//! tool (the preferences-querying tool described in spec §9 "cyclic
//! agent-calls-tool-calls-agent pattern") be composed on demand, broken
//! from the call cycle by late binding rather than mutual recursion.

use crate::llm::LlmClient;
use crate::model::ToolCall;
use crate::tools::{classify_family, all_tools, Family, ToolExecutable};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// An LLM-visible tool descriptor, sent as part of the tool catalog.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutable>>,
    /// Memoized late-bound tool variants, keyed by the LLM client's identity
    /// (its pointer address stands in for client identity — good enough for
    /// a process-local registry that never swaps clients mid-run).
    llm_bound_variants: Mutex<HashMap<usize, Arc<dyn ToolExecutable>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            llm_bound_variants: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(mut self, tool: Arc<dyn ToolExecutable>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn register_all_builtin(mut self, cache: Arc<crate::cache::ResultCache>) -> Self {
        for tool in all_tools(cache) {
            self.tools.insert(tool.name().to_string(), tool);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutable>> {
        self.tools.get(name).cloned()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn classify_family(&self, name: &str) -> Family {
        classify_family(name)
    }

    /// Schemas to send the LLM, in a stable (sorted by name) order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut list: Vec<_> = self
            .tools
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    pub async fn execute(&self, call: &ToolCall) -> Option<Result<serde_json::Value, String>> {
        let tool = self.tools.get(&call.tool_name)?.clone();
        Some(tool.execute(call).await)
    }

    /// Build (or return the memoized) late-bound preferences-querying tool
    /// closing over `llm`. Memoized per LLM client identity so repeated
    /// calls within a run reuse the same bound tool instance.
    pub fn preferences_query_tool(&self, llm: Arc<dyn LlmClient>) -> Arc<dyn ToolExecutable> {
        let key = Arc::as_ptr(&llm) as *const () as usize;
        let mut variants = self.llm_bound_variants.lock().unwrap();
        variants
            .entry(key)
            .or_insert_with(|| Arc::new(PreferencesQueryTool { llm }) as Arc<dyn ToolExecutable>)
            .clone()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Late-bound tool: answers a natural-language question about household
/// preferences by delegating to the LLM itself with the raw preferences
/// file injected as context. This is the component spec §9 calls out as
/// needing late binding to avoid a static mutually-recursive graph.
struct PreferencesQueryTool {
    llm: Arc<dyn LlmClient>,
}

#[async_trait::async_trait]
impl ToolExecutable for PreferencesQueryTool {
    fn name(&self) -> &str {
        "preferences_query"
    }

    fn description(&self) -> &str {
        "Ask a natural-language question about household media preferences."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "question": {"type": "string"} },
            "required": ["question"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<serde_json::Value, String> {
        let question = call
            .arguments
            .get("question")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing 'question' argument".to_string())?;

        let preferences_text = std::fs::read_to_string("preferences.json").unwrap_or_else(|_| "{}".to_string());
        let prompt = format!(
            "Household preferences (JSON): {preferences_text}\n\nQuestion: {question}\n\nAnswer concisely using only the preferences above."
        );

        let messages = vec![crate::model::Message::user(prompt)];
        let response = self
            .llm
            .chat(&messages, &[], crate::model::ToolChoice::None)
            .await
            .map_err(|e| format!("preferences_query LLM call failed: {e}"))?;

        Ok(serde_json::json!({ "answer": response.content }))
    }
}
