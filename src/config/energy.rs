// src/config/energy.rs
// Energy regulator + sleep-bound configuration (spec §4.A, §4.F, §6).

use serde::{Deserialize, Serialize};

use super::helpers::{env_f64, env_u64};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    pub e_min: f64,
    pub e_max: f64,
    pub replenish_rate: f64,
    pub sleep_min_s: u64,
    pub sleep_max_s: u64,
    /// Energy level below which the loop switches to the cheap model.
    pub low_threshold: f64,
    /// Energy level above which the loop restores the preferred model.
    pub high_threshold: f64,
}

impl EnergyConfig {
    pub fn from_env() -> Self {
        Self {
            e_min: env_f64("SYNAPSE_ENERGY_MIN", -50.0),
            e_max: env_f64("SYNAPSE_ENERGY_MAX", 100.0),
            replenish_rate: env_f64("SYNAPSE_REPLENISH_RATE", 10.0),
            sleep_min_s: env_u64("SYNAPSE_SLEEP_MIN_S", 1),
            sleep_max_s: env_u64("SYNAPSE_SLEEP_MAX_S", 60),
            low_threshold: env_f64("SYNAPSE_MODEL_LOW_THRESHOLD", 20.0),
            high_threshold: env_f64("SYNAPSE_MODEL_HIGH_THRESHOLD", 50.0),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.e_min >= self.e_max {
            anyhow::bail!(
                "SYNAPSE_ENERGY_MIN ({}) must be less than SYNAPSE_ENERGY_MAX ({})",
                self.e_min,
                self.e_max
            );
        }
        if self.replenish_rate < 0.0 {
            anyhow::bail!("SYNAPSE_REPLENISH_RATE must be non-negative");
        }
        if self.sleep_min_s == 0 || self.sleep_min_s > self.sleep_max_s {
            anyhow::bail!("sleep bounds must satisfy 0 < min <= max");
        }
        Ok(())
    }
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
