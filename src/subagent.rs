//! C11 — Sub-Agent Runner.
//!
//! A constrained, single-iteration variant of the Agent Loop (§4.11): call
//! tools at most once, read the results, and produce a final answer with
//! `tool_choice=none`. Never loops. Used for focused operations — episode
//! fallback search, quality-profile fallback, compact recommendations —
//! where a full multi-turn conversation would be overkill. Reuses C1
//! (registry), C2/C3/C4 (via `Executor`), but not C7/C8 — there is no
//! phase or finalization gate to run when there is only ever one turn.

use crate::cache::ResultCache;
use crate::circuit::CircuitBreaker;
use crate::config::RuntimeConfig;
use crate::executor::Executor;
use crate::llm::{LlmClient, LlmError};
use crate::model::{Message, ToolChoice};
use crate::scheduler::BatchScheduler;
use crate::summarizer::{summarize, DetailLevel};
use std::sync::Arc;

pub struct SubAgentRunner {
    registry: Arc<crate::registry::ToolRegistry>,
    cache: Arc<ResultCache>,
    breaker: Arc<CircuitBreaker>,
    config: Arc<RuntimeConfig>,
    llm: Arc<dyn LlmClient>,
}

#[derive(Debug, Clone)]
pub struct SubAgentOutcome {
    pub reply: String,
    pub tool_calls: u32,
}

impl SubAgentRunner {
    pub fn new(
        registry: Arc<crate::registry::ToolRegistry>,
        cache: Arc<ResultCache>,
        breaker: Arc<CircuitBreaker>,
        config: Arc<RuntimeConfig>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self { registry, cache, breaker, config, llm }
    }

    /// Run a single focused turn (§4.11). `task` is a compact instruction,
    /// not a full conversation — the sub-agent has no memory of prior turns.
    pub async fn run_once(&self, task: &str) -> SubAgentOutcome {
        let mut messages = vec![
            Message::system(
                "You are a narrow helper agent. You may call at most one tool, then \
                 must answer directly. Do not ask clarifying questions.",
            ),
            Message::user(task),
        ];

        let schemas = self.registry.schemas();
        let response = match self.llm.chat(&messages, &schemas, ToolChoice::Auto).await {
            Ok(r) => r,
            Err(LlmError::Transport(msg)) | Err(LlmError::Provider(msg)) => {
                return SubAgentOutcome { reply: format!("sub-agent call failed: {msg}"), tool_calls: 0 };
            }
        };

        if !response.wants_tools() {
            return SubAgentOutcome { reply: response.content, tool_calls: 0 };
        }

        let executor = Executor::new(self.registry.clone(), self.cache.clone(), self.breaker.clone(), self.config.clone());
        let scheduler = BatchScheduler::new(executor, self.config.clone());
        let mut run_state = crate::model::RunState::new(false);

        messages.push(Message::assistant_with_tool_calls(response.tool_calls.clone()));
        let results = scheduler.run_batch(response.tool_calls, &mut run_state).await;
        let tool_calls = results.len() as u32;

        for result in &results {
            let family = self.registry.classify_family(&result.tool_name).as_str().to_string();
            let text = match &result.value {
                Some(value) => {
                    let ref_id = self.cache.store_full_result(value.clone());
                    summarize(&family, DetailLevel::Compact, value, self.config.tools.list_max_items, Some(ref_id))
                        .to_message_text()
                }
                None => crate::summarizer::summarize_result(result, &family, DetailLevel::Compact, self.config.tools.list_max_items)
                    .to_message_text(),
            };
            messages.push(Message::tool_result(result.call_id.clone(), result.tool_name.clone(), text));
        }

        let final_response = match self.llm.chat(&messages, &[], ToolChoice::None).await {
            Ok(r) => r,
            Err(LlmError::Transport(msg)) | Err(LlmError::Provider(msg)) => {
                return SubAgentOutcome { reply: format!("sub-agent final call failed: {msg}"), tool_calls };
            }
        };

        SubAgentOutcome { reply: final_response.content, tool_calls }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::model::ToolCall;
    use crate::registry::ToolRegistry;

    fn runner(llm: MockLlmClient) -> SubAgentRunner {
        let cache = Arc::new(ResultCache::new());
        SubAgentRunner::new(
            Arc::new(ToolRegistry::new().register_all_builtin(cache.clone())),
            cache,
            Arc::new(CircuitBreaker::new()),
            Arc::new(RuntimeConfig::default()),
            Arc::new(llm),
        )
    }

    #[tokio::test]
    async fn answers_directly_with_no_tool_call() {
        let sub = runner(MockLlmClient::new(vec![MockLlmClient::text("No fallback needed.")]));
        let outcome = sub.run_once("is there a better quality profile?").await;
        assert_eq!(outcome.reply, "No fallback needed.");
        assert_eq!(outcome.tool_calls, 0);
    }

    #[tokio::test]
    async fn calls_one_tool_then_finalizes() {
        let sub = runner(MockLlmClient::new(vec![
            MockLlmClient::tool_calls(vec![ToolCall {
                call_id: "1".to_string(),
                tool_name: "tmdb_search".to_string(),
                arguments: serde_json::json!({"query": "inception"}),
            }]),
            MockLlmClient::text("Found Inception (2010)."),
        ]));
        let outcome = sub.run_once("find a close match for inception").await;
        assert_eq!(outcome.reply, "Found Inception (2010).");
        assert_eq!(outcome.tool_calls, 1);
    }
}
