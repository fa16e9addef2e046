pub mod agent;
pub mod cache;
pub mod circuit;
pub mod config;
pub mod error;
pub mod executor;
pub mod finalize;
pub mod llm;
pub mod logger;
pub mod model;
pub mod phase;
pub mod progress;
pub mod registry;
pub mod scheduler;
pub mod subagent;
pub mod summarizer;
pub mod tools;

pub use agent::{AgentLoop, AgentMode, TurnOutcome};
pub use error::{AgentError, AgentResult};
pub use subagent::{SubAgentOutcome, SubAgentRunner};

use std::sync::Arc;

/// The shared, process-local state every run draws on: the tool catalog,
/// the cross-run result cache, and the circuit breakers (§9 Design Notes
/// "model as a small injectable runtime struct"). Constructed once at
/// process start and handed to each `AgentLoop`/`SubAgentRunner`.
pub struct Runtime {
    pub registry: Arc<registry::ToolRegistry>,
    pub cache: Arc<cache::ResultCache>,
    pub breaker: Arc<circuit::CircuitBreaker>,
    pub config: Arc<config::RuntimeConfig>,
    pub progress: Arc<progress::ProgressBroadcaster>,
}

impl Runtime {
    pub fn new(config: config::RuntimeConfig) -> Self {
        let progress_interval = config.ux.progress_update_interval_ms;
        let cache = Arc::new(cache::ResultCache::new());
        Self {
            registry: Arc::new(registry::ToolRegistry::new().register_all_builtin(cache.clone())),
            cache,
            breaker: Arc::new(circuit::CircuitBreaker::new()),
            config: Arc::new(config),
            progress: Arc::new(progress::ProgressBroadcaster::new(progress_interval)),
        }
    }

    pub fn with_stdout_progress(mut self) -> Self {
        let interval = self.config.ux.progress_update_interval_ms;
        let broadcaster = progress::ProgressBroadcaster::new(interval)
            .with_sink(Box::new(progress::StdoutSink));
        self.progress = Arc::new(broadcaster);
        self
    }

    pub fn agent_loop(&self, llm: Arc<dyn llm::LlmClient>) -> agent::AgentLoop {
        agent::AgentLoop::new(
            self.registry.clone(),
            self.cache.clone(),
            self.breaker.clone(),
            self.config.clone(),
            llm,
            self.progress.clone(),
        )
    }

    pub fn sub_agent_runner(&self, llm: Arc<dyn llm::LlmClient>) -> subagent::SubAgentRunner {
        subagent::SubAgentRunner::new(
            self.registry.clone(),
            self.cache.clone(),
            self.breaker.clone(),
            self.config.clone(),
            llm,
        )
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(config::RuntimeConfig::default())
    }
}
