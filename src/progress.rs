//! C10 — Progress Broadcaster.
//!
//! Fans status events out to one or more sinks (a terminal, a chat client)
//! with per-event-type throttling so a burst of tool calls doesn't flood the
//! UI (§4.10). Every event also lands in the audit trail via
//! [`crate::logger::audit_log`], which is never throttled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// §6's full event catalog. Variant names map to the wire event names by
/// `snake_case`-ing and dotting the boundary documented alongside each one
/// below (`PhaseReadOnly` -> `phase.read_only`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    AgentStart,
    Thinking,
    LlmStart,
    LlmFinish,
    ToolStart,
    ToolFinish,
    ToolError,
    PhaseReadOnly,
    PhaseWriteEnabled,
    PhaseValidationPlanned,
    PhaseValidation,
    Heartbeat,
    AgentFinish,
    AgentMetrics,
    Typing,
}

impl EventType {
    /// Control events — `tool.start/finish/error`, `llm.start/finish`,
    /// `agent.start/finish` — are never throttled (§4.10); everything else
    /// (thinking, phase transitions, the typing pulse, heartbeats, metrics)
    /// goes through the per-type throttle.
    fn is_throttled(self) -> bool {
        !matches!(
            self,
            EventType::ToolStart
                | EventType::ToolFinish
                | EventType::ToolError
                | EventType::LlmStart
                | EventType::LlmFinish
                | EventType::AgentStart
                | EventType::AgentFinish
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub event_type: EventType,
    pub message: String,
}

/// A destination for progress events. Errors from one sink never block or
/// fail delivery to the others (§4.10 "per-sink error isolation").
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent) -> Result<(), String>;
}

/// Writes events to stdout, used by the CLI demo.
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn emit(&self, event: &ProgressEvent) -> Result<(), String> {
        println!("[{:?}] {}", event.event_type, event.message);
        Ok(())
    }
}

pub struct ProgressBroadcaster {
    sinks: Vec<Box<dyn ProgressSink>>,
    last_emitted: Mutex<HashMap<EventType, Instant>>,
    throttle_interval: Duration,
}

impl ProgressBroadcaster {
    pub fn new(throttle_interval_ms: u64) -> Self {
        Self {
            sinks: Vec::new(),
            last_emitted: Mutex::new(HashMap::new()),
            throttle_interval: Duration::from_millis(throttle_interval_ms),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Emit an event to every sink, skipping ones currently throttled.
    /// Always writes to the audit log regardless of throttling, humanizing
    /// the message the way the broadcaster would present it to a user.
    pub fn emit(&self, event_type: EventType, message: impl Into<String>) {
        let message = message.into();
        crate::logger::audit_log(&format!("progress[{event_type:?}]: {message}"));

        if event_type.is_throttled() && !self.should_emit(event_type) {
            return;
        }

        let event = ProgressEvent { event_type, message };
        for sink in &self.sinks {
            if let Err(err) = sink.emit(&event) {
                log::warn!("progress sink failed: {err}");
            }
        }
    }

    fn should_emit(&self, event_type: EventType) -> bool {
        let mut last_emitted = self.last_emitted.lock().unwrap();
        let now = Instant::now();
        match last_emitted.get(&event_type) {
            Some(last) if now.duration_since(*last) < self.throttle_interval => false,
            _ => {
                last_emitted.insert(event_type, now);
                true
            }
        }
    }

    /// A short "still working" pulse, meant to be emitted on a fixed tick
    /// while a long tool call is in flight (§4.10 "typing pulse").
    pub fn typing_pulse(&self) {
        self.emit(EventType::Typing, "working on it...");
    }

    /// Spawn the §4.10 heartbeat task: a keep-alive event on a fixed tick
    /// for the life of the run. The caller aborts the returned handle once
    /// the turn completes — there is no natural end condition otherwise.
    pub fn spawn_heartbeat(self: &Arc<Self>, interval_ms: u64) -> tokio::task::JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                broadcaster.emit(EventType::Heartbeat, "still here");
            }
        })
    }

    /// Spawn the §4.10 typing-pulse task, invoking `typing_pulse()` at a
    /// slower cadence than the heartbeat for as long as the turn runs.
    pub fn spawn_typing_pulse(self: &Arc<Self>, interval_ms: u64) -> tokio::task::JoinHandle<()> {
        let broadcaster = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                broadcaster.typing_pulse();
            }
        })
    }

    /// Humanize a tool name into a short present-tense status line (§4.10).
    pub fn humanize_tool_call(tool_name: &str) -> String {
        match tool_name {
            "tmdb_search" => "Searching for matches...".to_string(),
            "tmdb_get_details" => "Looking up details...".to_string(),
            "plex_search" => "Checking your Plex library...".to_string(),
            "plex_get_libraries" => "Listing your Plex libraries...".to_string(),
            "radarr_add_movie" => "Adding the movie to Radarr...".to_string(),
            "radarr_get_movies" => "Checking Radarr's queue...".to_string(),
            "sonarr_add_series" => "Adding the series to Sonarr...".to_string(),
            "sonarr_get_series" => "Checking Sonarr's queue...".to_string(),
            "preferences_get" => "Reading your preferences...".to_string(),
            "preferences_update" => "Updating your preferences...".to_string(),
            other => format!("Running {other}..."),
        }
    }
}
