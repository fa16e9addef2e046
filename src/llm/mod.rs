//! The LLM provider client (§6 "LLM client (consumed)") is an external
//! collaborator — only its interface lives in this crate. [`LlmClient`] is
//! deliberately thin: one call surface taking messages + tools, returning
//! either text or tool-call requests. [`MockLlmClient`] is a scripted
//! in-memory implementation used by tests and the CLI demo; a real
//! integration (OpenAI/Anthropic/etc, as the teacher crate implements for
//! its own purposes) plugs in behind the same trait.

use crate::model::{Message, Role, ToolCall, ToolChoice};
use crate::registry::ToolSchema;
use async_trait::async_trait;
use std::sync::Mutex;

/// One role in the role→model resolution table (§6, §9 Design Notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Chat,
    Smart,
    Worker,
    Quick,
    Summarizer,
}

/// The LLM's response to a single `chat` call.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl LlmResponse {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned an error: {0}")]
    Provider(String),
}

/// Unified interface for LLM providers, consumed — not implemented — by the
/// agent core (§6).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        tool_choice: ToolChoice,
    ) -> Result<LlmResponse, LlmError>;
}

/// A scripted response queue, used to drive the agent loop deterministically
/// in tests (§8 "fixtures stub LLM and tools").
pub struct MockLlmClient {
    responses: Mutex<Vec<LlmResponse>>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self { responses: Mutex::new(responses) }
    }

    pub fn text(content: impl Into<String>) -> LlmResponse {
        LlmResponse { content: content.into(), tool_calls: vec![] }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> LlmResponse {
        LlmResponse { content: String::new(), tool_calls: calls }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        tool_choice: ToolChoice,
    ) -> Result<LlmResponse, LlmError> {
        // §8 invariant 4: `tool_choice=none` must never be sent while tools
        // are still attached to the request. The production client enforces
        // this by omitting `tools` from the wire payload when `None` is
        // requested; the mock asserts the same contract the caller promised.
        if tool_choice == ToolChoice::None && !tools.is_empty() {
            return Err(LlmError::Transport(
                "tool_choice=none must be sent without a tools list".to_string(),
            ));
        }
        let _ = messages;
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(LlmResponse::default());
        }
        Ok(responses.remove(0))
    }
}

/// Validate the §3 message-shape invariant on a built conversation: every
/// assistant message declaring `tool_calls` must be immediately followed by
/// one tool message per declared call, in order, before the next assistant
/// turn (§8 invariant 1). Exposed for tests; the agent loop itself only ever
/// builds conversations this way, so violating it would be a core bug.
pub fn validate_message_shape(messages: &[Message]) -> Result<(), String> {
    let mut i = 0;
    while i < messages.len() {
        let msg = &messages[i];
        if msg.role == Role::Assistant {
            if let Some(calls) = &msg.tool_calls {
                for (offset, call) in calls.iter().enumerate() {
                    let idx = i + 1 + offset;
                    let tool_msg = messages.get(idx).ok_or_else(|| {
                        format!("expected tool message at index {idx} for call {}", call.call_id)
                    })?;
                    if tool_msg.role != Role::Tool || tool_msg.tool_call_id.as_deref() != Some(&call.call_id) {
                        return Err(format!(
                            "message at index {idx} does not match declared call {}",
                            call.call_id
                        ));
                    }
                }
                i += 1 + calls.len();
                continue;
            }
        }
        i += 1;
    }
    Ok(())
}
