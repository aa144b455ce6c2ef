// src/config/loop_config.rs
// Sensitive-loop tuning knobs (spec §4.F, §6).

use serde::{Deserialize, Serialize};

use super::helpers::{env_u64, env_usize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// How many of the most recent conversation messages are composed into
    /// context each cycle (`historyPerCycle`).
    pub history_per_cycle: usize,
    /// Alias kept for the `contextWindow` name used in spec.md §6; identical
    /// semantics to `history_per_cycle` in this implementation.
    pub context_window: usize,
    /// Optional hard cap on total loop runtime, in seconds. `None` means run
    /// until shut down.
    pub duration_s: Option<u64>,
}

impl LoopConfig {
    pub fn from_env() -> Self {
        let history_per_cycle = env_usize("SYNAPSE_HISTORY_PER_CYCLE", 10);
        Self {
            history_per_cycle,
            context_window: env_usize("SYNAPSE_CONTEXT_WINDOW", history_per_cycle),
            duration_s: std::env::var("SYNAPSE_LOOP_DURATION_S")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    pub fn duration(&self) -> Option<std::time::Duration> {
        self.duration_s.map(std::time::Duration::from_secs)
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// MCP sub-agent tuning (spec §4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentConfig {
    /// Energy consumed per second of sub-agent processing time (`k`).
    pub k_energy_per_second: f64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl SubAgentConfig {
    pub fn from_env() -> Self {
        Self {
            k_energy_per_second: super::helpers::env_f64("SYNAPSE_SUBAGENT_K_ENERGY_PER_SEC", 2.0),
            max_retries: env_u64("SYNAPSE_SUBAGENT_MAX_RETRIES", 3) as u32,
            backoff_base_ms: env_u64("SYNAPSE_SUBAGENT_BACKOFF_BASE_MS", 200),
            backoff_cap_ms: env_u64("SYNAPSE_SUBAGENT_BACKOFF_CAP_MS", 5_000),
        }
    }
}

impl Default for SubAgentConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
