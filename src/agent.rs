//! C9 — Agent Loop.
//!
//! Orchestrates one user turn end to end: prompt assembly, LLM calls, tool
//! batch execution, context pruning, and termination (§4.9). `RunState` is
//! owned exclusively here and mutated in place, not recursed over — the
//! "two-pass LLM-call semantics" the design notes call for.

use crate::cache::ResultCache;
use crate::circuit::CircuitBreaker;
use crate::config::RuntimeConfig;
use crate::executor::Executor;
use crate::finalize::finalizable;
use crate::llm::{AgentRole, LlmClient, LlmError};
use crate::model::{Message, RunState, ToolChoice};
use crate::phase::PhaseController;
use crate::progress::{EventType, ProgressBroadcaster};
use crate::registry::ToolRegistry;
use crate::scheduler::BatchScheduler;
use crate::summarizer::{summarize_result, DetailLevel};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// `recommend()` vs `converse()` from the original bot's `Agent` class:
/// recommendations are read-only and never enter the write/validation
/// machinery at all (§4 supplement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentMode {
    Converse,
    Recommend,
}

pub struct AgentLoop {
    registry: Arc<ToolRegistry>,
    cache: Arc<ResultCache>,
    breaker: Arc<CircuitBreaker>,
    config: Arc<RuntimeConfig>,
    llm: Arc<dyn LlmClient>,
    progress: Arc<ProgressBroadcaster>,
    /// Memoized role resolution, mirroring the original's
    /// `_get_role_selection` cache (§4 supplement) — cheap to recompute here,
    /// but kept as a cache since a real multi-provider `LlmClient` would make
    /// resolution (provider lookup, model id string formatting) non-trivial.
    role_cache: Mutex<HashMap<AgentMode, AgentRole>>,
}

/// A standalone message, or an assistant `tool_calls` message paired with
/// the tool messages answering it — the atomic unit `prune_context` drops
/// or keeps as a whole (§8 invariant 1).
struct ContextBlock {
    messages: Vec<Message>,
    tool_count: usize,
}

/// Outcome of a single completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub llm_calls: u32,
    pub tool_calls: u32,
    pub elapsed_ms: u64,
    pub iteration_budget_exhausted: bool,
}

impl AgentLoop {
    pub fn new(
        registry: Arc<ToolRegistry>,
        cache: Arc<ResultCache>,
        breaker: Arc<CircuitBreaker>,
        config: Arc<RuntimeConfig>,
        llm: Arc<dyn LlmClient>,
        progress: Arc<ProgressBroadcaster>,
    ) -> Self {
        Self { registry, cache, breaker, config, llm, progress, role_cache: Mutex::new(HashMap::new()) }
    }

    /// Resolve which role drives the main loop for a given mode (§6, §9
    /// Design Notes "per-role model selection"). `Recommend` always uses the
    /// lighter `Quick` role since it never writes and rarely needs the
    /// strongest model. Memoized per instance (§4 supplement).
    fn role_for_mode(&self, mode: AgentMode) -> AgentRole {
        *self.role_cache.lock().unwrap().entry(mode).or_insert_with(|| match mode {
            AgentMode::Converse => AgentRole::Chat,
            AgentMode::Recommend => AgentRole::Quick,
        })
    }

    /// Run one full user turn (§4.9 steps 1-12).
    pub async fn run_turn(&self, user_message: &str, mode: AgentMode) -> TurnOutcome {
        let _role = self.role_for_mode(mode);
        let must_write = mode == AgentMode::Converse && crate::phase::infers_write_intent(user_message);
        let mut run_state = RunState::new(must_write);
        self.progress.emit(EventType::AgentStart, format!("starting turn {}", run_state.run_id));
        self.progress.emit(EventType::PhaseReadOnly, "starting read-only");
        if mode == AgentMode::Converse {
            PhaseController::note_utterance(&mut run_state, user_message);
        }

        let heartbeat = self.progress.spawn_heartbeat(self.config.ux.heartbeat_interval_ms);
        let typing_pulse = self.progress.spawn_typing_pulse(self.config.ux.typing_pulse_ms);

        let mut messages = vec![self.system_prompt(mode)];
        messages.push(Message::user(user_message));

        let executor = Executor::new(self.registry.clone(), self.cache.clone(), self.breaker.clone(), self.config.clone());
        let scheduler = BatchScheduler::new(executor, self.config.clone());

        let max_iters = self.config.llm.agent_max_iters;
        let mut exhausted = false;
        let mut attempted_tools: Vec<String> = Vec::new();

        let final_reply = 'turn: loop {
            if run_state.iter_index >= max_iters {
                exhausted = true;
                break 'turn self.graceful_exhaustion_summary(&attempted_tools);
            }

            let tool_choice = run_state.next_tool_choice_override.take().unwrap_or(ToolChoice::Auto);

            let schemas = if tool_choice == ToolChoice::None {
                Vec::new()
            } else if mode == AgentMode::Recommend {
                // Recommendations never write: don't even advertise write-style
                // tools rather than relying solely on phase filtering below.
                self.registry.schemas().into_iter().filter(|s| !crate::tools::is_write_style(&s.name)).collect()
            } else {
                self.registry.schemas()
            };
            self.progress.emit(EventType::Thinking, "thinking about the next step");
            self.progress.emit(EventType::LlmStart, "calling the model");
            let response = match self.llm.chat(&messages, &schemas, tool_choice).await {
                Ok(r) => r,
                Err(LlmError::Transport(msg)) | Err(LlmError::Provider(msg)) => {
                    break 'turn format!("I hit a problem talking to the model: {msg}");
                }
            };
            run_state.llm_call_count += 1;
            self.progress.emit(EventType::LlmFinish, "model responded");

            if !response.wants_tools() {
                if must_write && !run_state.write_completed && !run_state.require_validation_read {
                    messages.push(Message::system(
                        "A write action is required to satisfy this request. You must call a tool.",
                    ));
                    run_state.next_tool_choice_override = Some(ToolChoice::Required);
                    run_state.iter_index += 1;
                    continue 'turn;
                }
                break 'turn response.content;
            }

            let phase = PhaseController::current_phase(&run_state);
            self.emit_phase_event(phase);
            let filtered_calls = PhaseController::filter_for_phase(response.tool_calls, phase);

            if filtered_calls.is_empty() {
                messages.push(Message::assistant_text(response.content));
                run_state.iter_index += 1;
                continue 'turn;
            }

            messages.push(Message::assistant_with_tool_calls(filtered_calls.clone()));

            // §4.7: "seen_write_intent" tracks whether the LLM has *ever
            // requested* a write-style tool, independent of whether the
            // user's literal utterance matched the write-intent keyword
            // scan — the two are separate finalization guards (§4.8).
            if filtered_calls.iter().any(|c| crate::tools::is_write_style(&c.tool_name)) {
                run_state.seen_write_intent = true;
            }

            for call in &filtered_calls {
                attempted_tools.push(call.tool_name.clone());
                self.progress.emit(EventType::ToolStart, ProgressBroadcaster::humanize_tool_call(&call.tool_name));
            }

            let mut results = scheduler.run_batch(filtered_calls, &mut run_state).await;
            run_state.tool_call_count += results.len() as u32;

            for result in &mut results {
                let family = self.registry.classify_family(&result.tool_name).as_str().to_string();
                let event = if result.is_ok() { EventType::ToolFinish } else { EventType::ToolError };
                self.progress.emit(event, format!("{} -> {}", result.tool_name, if result.is_ok() { "ok" } else { "error" }));
                let summary = match &result.value {
                    Some(value) => {
                        let ref_id = self.cache.store_full_result(value.clone());
                        result.ref_id = Some(ref_id.clone());
                        crate::summarizer::summarize(&family, DetailLevel::Compact, value, self.config.tools.list_max_items, Some(ref_id))
                    }
                    None => summarize_result(result, &family, DetailLevel::Compact, self.config.tools.list_max_items),
                };
                messages.push(Message::tool_result(result.call_id.clone(), result.tool_name.clone(), summary.to_message_text()));
            }

            self.prune_context(&mut messages);
            self.update_run_state_after_batch(&mut run_state, &results);

            if finalizable(&run_state, &results) {
                run_state.force_finalize_next = true;
                run_state.next_tool_choice_override = Some(ToolChoice::None);
            }

            run_state.iter_index += 1;
        };

        heartbeat.abort();
        typing_pulse.abort();

        let elapsed_ms = run_state.started_at.elapsed().as_millis() as u64;
        self.progress.emit(
            EventType::AgentMetrics,
            format!(
                "llm_calls={} tool_calls={} elapsed_ms={elapsed_ms}",
                run_state.llm_call_count, run_state.tool_call_count
            ),
        );
        self.progress.emit(EventType::AgentFinish, format!("turn {} complete", run_state.run_id));
        TurnOutcome {
            reply: final_reply,
            llm_calls: run_state.llm_call_count,
            tool_calls: run_state.tool_call_count,
            elapsed_ms,
            iteration_budget_exhausted: exhausted,
        }
    }

    /// §4.10: the broadcaster observes every phase transition.
    fn emit_phase_event(&self, phase: crate::phase::Phase) {
        match phase {
            crate::phase::Phase::Read => self.progress.emit(EventType::PhaseReadOnly, "read-only phase"),
            crate::phase::Phase::Write => self.progress.emit(EventType::PhaseWriteEnabled, "writes enabled"),
            crate::phase::Phase::Validate => self.progress.emit(EventType::PhaseValidation, "validating the last write"),
        }
    }

    fn system_prompt(&self, mode: AgentMode) -> Message {
        match mode {
            AgentMode::Converse => Message::system(
                "You are a household media assistant. Use the available tools to search, \
                 recommend, and manage movies and shows across Plex, Radarr, and Sonarr.",
            ),
            AgentMode::Recommend => Message::system(
                "You are a household media assistant producing a recommendation only. \
                 Use read-only tools to discover options; never modify anything.",
            ),
        }
    }

    /// §4.9 step 9: prune old tool messages down to the last K, leaving a
    /// single note behind recording how many were dropped.
    ///
    /// An assistant message that declares `tool_calls` and the tool messages
    /// answering it travel together as one block (§8 invariant 1 — a
    /// declaring message split from its results is invalid on the wire).
    /// Pruning therefore drops whole tool-bearing blocks from oldest to
    /// newest rather than individual tool messages; non-tool messages
    /// (system prompt, user turns, plain assistant text) are never dropped.
    fn prune_context(&self, messages: &mut Vec<Message>) {
        let cap = self.config.tools.max_tool_messages_in_context;
        let blocks = Self::group_into_blocks(std::mem::take(messages));

        let total_tools: usize = blocks.iter().map(|b| b.tool_count).sum();
        if total_tools <= cap {
            *messages = blocks.into_iter().flat_map(|b| b.messages).collect();
            return;
        }

        let mut running = 0usize;
        let mut keep = vec![true; blocks.len()];
        for (i, block) in blocks.iter().enumerate().rev() {
            if block.tool_count == 0 {
                continue;
            }
            if running + block.tool_count > cap {
                keep[i] = false;
            } else {
                running += block.tool_count;
            }
        }

        let dropped_tool_count = total_tools - running;
        let mut pruned: Vec<Message> = blocks
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep[*i])
            .flat_map(|(_, b)| b.messages)
            .collect();
        pruned.push(Message::system(format!("({dropped_tool_count} earlier tool results pruned from context)")));
        *messages = pruned;
    }

    /// Group a message list into blocks: a standalone message, or an
    /// assistant `tool_calls` message plus the exact run of tool messages
    /// answering it.
    fn group_into_blocks(messages: Vec<Message>) -> Vec<ContextBlock> {
        let mut blocks = Vec::new();
        let mut iter = messages.into_iter();
        while let Some(message) = iter.next() {
            let declared = message.tool_calls.as_ref().map(|c| c.len()).unwrap_or(0);
            if declared == 0 {
                let tool_count = if message.role == crate::model::Role::Tool { 1 } else { 0 };
                blocks.push(ContextBlock { messages: vec![message], tool_count });
                continue;
            }
            let mut block_messages = vec![message];
            let mut tool_count = 0;
            for _ in 0..declared {
                match iter.next() {
                    Some(tool_msg) => {
                        tool_count += 1;
                        block_messages.push(tool_msg);
                    }
                    None => break,
                }
            }
            blocks.push(ContextBlock { messages: block_messages, tool_count });
        }
        blocks
    }

    /// §4.9 step 10: track write success/failure and the identity of what
    /// was last written, and transition `require_validation_read` off once
    /// the validation heuristic matches.
    fn update_run_state_after_batch(&self, run_state: &mut RunState, results: &[crate::model::ToolResult]) {
        for result in results {
            if crate::tools::is_write_style(&result.tool_name) && result.is_ok() {
                if !run_state.write_completed {
                    run_state.require_validation_read = true;
                    self.progress.emit(EventType::PhaseValidationPlanned, "a validation read is owed before finalizing");
                }
                run_state.write_completed = true;
                run_state.last_write_identity = result.value.as_ref().map(|v| crate::model::WriteIdentity {
                    tmdb_id: v.get("tmdbId").and_then(|x| x.as_i64()),
                    title: v.get("title").and_then(|x| x.as_str()).map(|s| s.to_string()),
                });
            }
        }

        if run_state.write_completed && run_state.require_validation_read && !run_state.validation_done {
            if let Some(identity) = &run_state.last_write_identity {
                let matched = results.iter().any(|r| {
                    !crate::tools::is_write_style(&r.tool_name)
                        && r.is_ok()
                        && Self::result_mentions_identity(r.value.as_ref(), identity)
                });
                if matched {
                    run_state.validation_done = true;
                }
            }
        }
    }

    /// The §9 Open Question validation heuristic: case-insensitive
    /// substring/id match of the just-written identity across any list
    /// field in a read result.
    fn result_mentions_identity(value: Option<&serde_json::Value>, identity: &crate::model::WriteIdentity) -> bool {
        let Some(value) = value else { return false };
        let items: Vec<&serde_json::Value> = value
            .as_object()
            .and_then(|obj| obj.values().find_map(|v| v.as_array()))
            .map(|arr| arr.iter().collect())
            .unwrap_or_else(|| vec![value]);

        items.iter().any(|item| {
            let id_match = identity
                .tmdb_id
                .map(|id| item.get("tmdbId").and_then(|v| v.as_i64()) == Some(id))
                .unwrap_or(false);
            let title_match = identity
                .title
                .as_ref()
                .and_then(|title| item.get("title").and_then(|v| v.as_str()).map(|t| (title, t)))
                .map(|(expected, actual)| actual.to_ascii_lowercase().contains(&expected.to_ascii_lowercase()))
                .unwrap_or(false);
            id_match || title_match
        })
    }

    /// §4.9 final paragraph / §4 supplement: a graceful summary of what was
    /// attempted, used instead of a bare error when the iteration budget
    /// runs out with work still pending.
    fn graceful_exhaustion_summary(&self, attempted_tools: &[String]) -> String {
        if attempted_tools.is_empty() {
            return "I wasn't able to complete this within my turn budget. Could you try again or narrow the request?".to_string();
        }
        let unique: Vec<&str> = {
            let mut seen = std::collections::HashSet::new();
            attempted_tools.iter().map(|s| s.as_str()).filter(|t| seen.insert(*t)).collect()
        };
        format!(
            "I ran out of turns before finishing. I had already tried: {}. Let me know if you'd like me to keep going.",
            unique.join(", ")
        )
    }
}
