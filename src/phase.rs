//! C7 — Phase Controller.
//!
//! A turn moves through Read → Write → Validate (§4.7). The controller
//! decides, from the user's utterance and the run so far, whether writes are
//! allowed yet and whether a validation read is still owed before the turn
//! can finalize.

use crate::model::{RunState, ToolCall};
use crate::tools::is_write_style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Read,
    Write,
    Validate,
}

/// Verbs that signal the user wants something changed, not just looked up
/// (§4.7 "write-intent inference"). Checked against the lowercased
/// utterance as whole-word matches would be checked in the original bot's
/// `intent.py` classifier — substring matching here to accept inflections
/// (e.g. "added", "adding") without a stemmer dependency.
const WRITE_VERBS: &[&str] = &[
    "add", "delete", "remove", "update", "monitor", "set", "queue", "download", "unmonitor",
];

const WRITE_TARGETS: &[&str] = &[
    "radarr", "sonarr", "rating", "watchlist", "queue", "library", "preference",
];

/// Idioms that imply a write without using one of the verb/target pairs
/// literally (§4.7).
const WRITE_IDIOMS: &[&str] = &[
    "grab it", "get it downloaded", "put it on", "track it", "pick it up",
];

/// Infer whether the user's utterance expresses write intent (§4.7, §9
/// Design Notes — a deliberately simple keyword matcher, not an LLM call).
pub fn infers_write_intent(utterance: &str) -> bool {
    let lower = utterance.to_ascii_lowercase();
    if WRITE_IDIOMS.iter().any(|idiom| lower.contains(idiom)) {
        return true;
    }
    let has_verb = WRITE_VERBS.iter().any(|v| lower.contains(v));
    let has_target = WRITE_TARGETS.iter().any(|t| lower.contains(t));
    has_verb && has_target
}

pub struct PhaseController;

impl PhaseController {
    /// Current phase, derived from `run_state` (§4.7 state diagram: Read
    /// until a write succeeds, then Validate until the validation read is
    /// done, otherwise Write is available once intent has been seen).
    pub fn current_phase(run_state: &RunState) -> Phase {
        if run_state.write_completed && run_state.require_validation_read && !run_state.validation_done {
            Phase::Validate
        } else if run_state.seen_write_intent || run_state.must_write {
            Phase::Write
        } else {
            Phase::Read
        }
    }

    /// Record that the user's utterance carries write intent, unlocking the
    /// Write phase for the remainder of the run (§4.7 — once seen, sticky
    /// for the whole run).
    pub fn note_utterance(run_state: &mut RunState, utterance: &str) {
        if infers_write_intent(utterance) {
            run_state.seen_write_intent = true;
        }
    }

    /// Filter a batch of proposed tool calls against the current phase: in
    /// `Read`, write-style calls are stripped before dispatch (§4.7 "phase
    /// gates what the executor is allowed to run").
    pub fn filter_for_phase(calls: Vec<ToolCall>, phase: Phase) -> Vec<ToolCall> {
        match phase {
            Phase::Read => calls.into_iter().filter(|c| !is_write_style(&c.tool_name)).collect(),
            Phase::Write | Phase::Validate => calls,
        }
    }
}
