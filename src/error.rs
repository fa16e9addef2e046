//! Crate-wide error types.
//!
//! Tool-level failures never surface as `AgentError` — they are materialized
//! into `ToolResult` and handed back to the LLM (see `executor.rs`). `AgentError`
//! is reserved for unrecoverable core errors: misconfiguration, a transport
//! failure talking to the LLM provider, or a registry that was never built.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("tool registry misconfigured: {0}")]
    Registry(String),

    #[error("LLM provider call failed: {0}")]
    Llm(String),

    #[error("turn exceeded iteration budget ({0} turns)")]
    IterationBudgetExhausted(u32),
}

pub type AgentResult<T> = Result<T, AgentError>;
