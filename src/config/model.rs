// src/config/model.rs
// Model roster + per-model energy cost table (spec §4.F step 5, §9 open question).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::helpers::{env_f64, env_or};

/// Energy charged per second of wall-clock LLM invocation time, by model id.
///
/// The source spec only gives examples (5 units/sec for a small model, 15 for
/// a large one); this table is the calibration point a real deployment would
/// tune. See DESIGN.md for the open-question resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub large_model: String,
    pub small_model: String,
    pub energy_per_second: HashMap<String, f64>,
    /// Energy charged per second of MCP tool round-trip time (spec §4.F step 6, `g(Δt_tool)`).
    pub tool_energy_per_second: f64,
}

impl ModelConfig {
    pub fn from_env() -> Self {
        let large_model = env_or("SYNAPSE_LARGE_MODEL", "gpt-5-large");
        let small_model = env_or("SYNAPSE_SMALL_MODEL", "gpt-5-mini");

        let mut energy_per_second = HashMap::new();
        energy_per_second.insert(
            large_model.clone(),
            env_f64("SYNAPSE_LARGE_MODEL_ENERGY_PER_SEC", 15.0),
        );
        energy_per_second.insert(
            small_model.clone(),
            env_f64("SYNAPSE_SMALL_MODEL_ENERGY_PER_SEC", 5.0),
        );

        Self {
            large_model,
            small_model,
            energy_per_second,
            tool_energy_per_second: env_f64("SYNAPSE_TOOL_ENERGY_PER_SEC", 3.0),
        }
    }

    /// Energy cost for `duration_s` seconds spent inside `model`.
    ///
    /// Unknown models fall back to the large-model rate: better to
    /// over-charge an unrecognized/custom model than silently give it free
    /// compute.
    pub fn charge_for(&self, model: &str, duration_s: f64) -> f64 {
        let rate = self
            .energy_per_second
            .get(model)
            .copied()
            .unwrap_or_else(|| {
                self.energy_per_second
                    .get(&self.large_model)
                    .copied()
                    .unwrap_or(15.0)
            });
        (rate * duration_s).max(0.0)
    }

    pub fn tool_charge_for(&self, duration_s: f64) -> f64 {
        (self.tool_energy_per_second * duration_s).max(0.0)
    }

    pub fn is_large(&self, model: &str) -> bool {
        model == self.large_model
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
