// src/stats.rs
// Process-wide counters for `getStats()` (spec §6): `{totalConversations,
// totalResponses, avgEnergyLevel, currentEnergy, uptime, modelSwitches,
// sleepCycles}`. Per-conversation `modelSwitches`/`sleepCycles` live on the
// conversation row (spec §3); these are the process-lifetime totals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

pub struct Stats {
    started_at: Instant,
    model_switches: AtomicU64,
    sleep_cycles: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self { started_at: Instant::now(), model_switches: AtomicU64::new(0), sleep_cycles: AtomicU64::new(0) }
    }

    pub fn record_model_switch(&self) {
        self.model_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sleep_cycle(&self) {
        self.sleep_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn model_switches(&self) -> u64 {
        self.model_switches.load(Ordering::Relaxed)
    }

    pub fn sleep_cycles(&self) -> u64 {
        self.sleep_cycles.load(Ordering::Relaxed)
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_conversations: u64,
    pub total_responses: u64,
    pub avg_energy_level: f64,
    pub current_energy: f64,
    pub uptime_seconds: f64,
    pub model_switches: u64,
    pub sleep_cycles: u64,
}
