// src/sensitive_loop/model_switch.rs
// Reactive model-switch policy (spec §4.F step 7).

use crate::config::{EnergyConfig, ModelConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSwitch {
    pub from: String,
    pub to: String,
    pub reason: &'static str,
}

/// If `E <= low_threshold` and `current` is the large model, switch to the
/// cheapest available model; if `E >= high_threshold` and `current` is the
/// small model, restore the preferred (large) model. No-op otherwise.
pub fn decide(current: &str, energy: f64, energy_cfg: &EnergyConfig, model_cfg: &ModelConfig) -> Option<ModelSwitch> {
    if model_cfg.is_large(current) && energy <= energy_cfg.low_threshold {
        return Some(ModelSwitch {
            from: current.to_string(),
            to: model_cfg.small_model.clone(),
            reason: "energy at or below low threshold",
        });
    }

    if !model_cfg.is_large(current) && energy >= energy_cfg.high_threshold {
        return Some(ModelSwitch {
            from: current.to_string(),
            to: model_cfg.large_model.clone(),
            reason: "energy at or above high threshold",
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfgs() -> (EnergyConfig, ModelConfig) {
        let energy = EnergyConfig {
            e_min: -50.0,
            e_max: 100.0,
            replenish_rate: 10.0,
            sleep_min_s: 1,
            sleep_max_s: 60,
            low_threshold: 20.0,
            high_threshold: 50.0,
        };
        let mut model = ModelConfig {
            large_model: "large".to_string(),
            small_model: "small".to_string(),
            energy_per_second: Default::default(),
            tool_energy_per_second: 3.0,
        };
        model.energy_per_second.insert("large".to_string(), 15.0);
        model.energy_per_second.insert("small".to_string(), 5.0);
        (energy, model)
    }

    #[test]
    fn switches_down_when_low() {
        let (e, m) = cfgs();
        let switch = decide("large", 15.0, &e, &m).unwrap();
        assert_eq!(switch.to, "small");
    }

    #[test]
    fn switches_up_when_high() {
        let (e, m) = cfgs();
        let switch = decide("small", 60.0, &e, &m).unwrap();
        assert_eq!(switch.to, "large");
    }

    #[test]
    fn no_switch_in_the_middle_band() {
        let (e, m) = cfgs();
        assert!(decide("large", 35.0, &e, &m).is_none());
        assert!(decide("small", 35.0, &e, &m).is_none());
    }
}
