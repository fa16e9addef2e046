//! Runtime configuration (§6 of the spec).
//!
//! Loaded from an optional TOML file and layered with built-in defaults —
//! the same shape as the original bot's `config/loader.py`, which merges a
//! YAML config over hardcoded fallbacks. No config file is required: every
//! field below has a default matching spec.md's documented defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{AgentError, AgentResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub agent_max_iters: u32,
    pub worker_max_iters: u32,
    pub max_iters: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            agent_max_iters: 6,
            worker_max_iters: 1,
            max_iters: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolTuning {
    pub timeout_ms: Option<u64>,
    pub retry_max: Option<u32>,
    pub backoff_base_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub timeout_ms: u64,
    pub retry_max: u32,
    pub backoff_base_ms: u64,
    pub parallelism: usize,
    pub list_max_items: usize,
    pub max_tool_messages_in_context: usize,
    pub per_tool: HashMap<String, ToolTuning>,
    pub per_family: HashMap<String, ToolTuning>,
    pub family_parallelism: HashMap<String, usize>,
    pub hedge_delay_ms_by_family: HashMap<String, u64>,
    pub circuit_open_after_failures: u32,
    pub circuit_open_for_ms: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let mut family_parallelism = HashMap::new();
        family_parallelism.insert("tmdb".to_string(), 16);
        family_parallelism.insert("radarr".to_string(), 4);
        family_parallelism.insert("sonarr".to_string(), 4);

        let mut hedge_delay_ms_by_family = HashMap::new();
        hedge_delay_ms_by_family.insert("tmdb".to_string(), 200);

        Self {
            timeout_ms: 8_000,
            retry_max: 2,
            backoff_base_ms: 200,
            parallelism: 4,
            list_max_items: 5,
            max_tool_messages_in_context: 12,
            per_tool: HashMap::new(),
            per_family: HashMap::new(),
            family_parallelism,
            hedge_delay_ms_by_family,
            circuit_open_after_failures: 3,
            circuit_open_for_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_short_sec: u64,
    pub ttl_medium_sec: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_short_sec: 60,
            ttl_medium_sec: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UxConfig {
    pub progress_update_interval_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub typing_pulse_ms: u64,
    pub progress_threshold_ms: u64,
}

impl Default for UxConfig {
    fn default() -> Self {
        Self {
            progress_update_interval_ms: 900,
            heartbeat_interval_ms: 15_000,
            typing_pulse_ms: 4_000,
            progress_threshold_ms: 1_500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    pub llm: LlmConfig,
    pub tools: ToolsConfig,
    pub cache: CacheConfig,
    pub ux: UxConfig,
}

impl RuntimeConfig {
    /// Load from a TOML file, falling back to defaults for any missing keys.
    pub fn load(path: &Path) -> AgentResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| AgentError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Load from `path` if it exists, otherwise return built-in defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(err) => log::warn!("falling back to default config: {err}"),
            }
        }
        Self::default()
    }

    pub fn tool_tuning(&self, tool_name: &str, family: &str) -> ResolvedTuning {
        let default = &self.tools;
        let per_tool = default.per_tool.get(tool_name);
        let per_family = default.per_family.get(family);

        let timeout_ms = per_tool
            .and_then(|t| t.timeout_ms)
            .or_else(|| per_family.and_then(|t| t.timeout_ms))
            .unwrap_or(default.timeout_ms);
        let retry_max = per_tool
            .and_then(|t| t.retry_max)
            .or_else(|| per_family.and_then(|t| t.retry_max))
            .unwrap_or(default.retry_max);
        let backoff_base_ms = per_tool
            .and_then(|t| t.backoff_base_ms)
            .or_else(|| per_family.and_then(|t| t.backoff_base_ms))
            .unwrap_or(default.backoff_base_ms);
        let hedge_delay_ms = *default.hedge_delay_ms_by_family.get(family).unwrap_or(&0);

        ResolvedTuning {
            timeout_ms,
            retry_max,
            backoff_base_ms,
            hedge_delay_ms,
            circuit_open_threshold: default.circuit_open_after_failures,
            circuit_cooldown_ms: default.circuit_open_for_ms,
        }
    }

    pub fn family_parallelism(&self, family: &str) -> usize {
        *self
            .tools
            .family_parallelism
            .get(family)
            .unwrap_or(&self.tools.parallelism)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolvedTuning {
    pub timeout_ms: u64,
    pub retry_max: u32,
    pub backoff_base_ms: u64,
    pub hedge_delay_ms: u64,
    pub circuit_open_threshold: u32,
    pub circuit_cooldown_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.tools.timeout_ms, 8_000);
        assert_eq!(cfg.tools.circuit_open_after_failures, 3);
        assert_eq!(cfg.tools.circuit_open_for_ms, 3_000);
    }

    #[test]
    fn per_tool_override_wins_over_family() {
        let mut cfg = RuntimeConfig::default();
        cfg.tools.per_family.insert(
            "radarr".to_string(),
            ToolTuning {
                timeout_ms: Some(1000),
                ..Default::default()
            },
        );
        cfg.tools.per_tool.insert(
            "radarr_add_movie".to_string(),
            ToolTuning {
                timeout_ms: Some(500),
                ..Default::default()
            },
        );
        let tuning = cfg.tool_tuning("radarr_add_movie", "radarr");
        assert_eq!(tuning.timeout_ms, 500);

        let tuning_other = cfg.tool_tuning("radarr_get_movies", "radarr");
        assert_eq!(tuning_other.timeout_ms, 1000);
    }

    #[test]
    fn load_or_default_falls_back_when_missing() {
        let cfg = RuntimeConfig::load_or_default(Path::new("/nonexistent/path.toml"));
        assert_eq!(cfg.tools.timeout_ms, 8_000);
    }
}
