// src/energy/mod.rs
// The energy regulator: a clamped leaky bucket (spec §4.A).
//
// Single scalar `E` plus a wall-clock timestamp. Not thread-hot by design —
// all mutation happens on the sensitive loop's single worker (spec §5); the
// edge may only read a point-in-time snapshot.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse energy classification (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyStatus {
    High,
    Medium,
    Low,
    Urgent,
}

impl EnergyStatus {
    pub fn classify(e: f64) -> Self {
        if e > 50.0 {
            EnergyStatus::High
        } else if e > 20.0 {
            EnergyStatus::Medium
        } else if e > 0.0 {
            EnergyStatus::Low
        } else {
            EnergyStatus::Urgent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnergyStatus::High => "high",
            EnergyStatus::Medium => "medium",
            EnergyStatus::Low => "low",
            EnergyStatus::Urgent => "urgent",
        }
    }
}

/// Point-in-time energy snapshot returned by `getEnergy()` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergySnapshot {
    pub current: f64,
    pub percentage: u8,
    pub status: EnergyStatus,
    pub as_of: DateTime<Utc>,
}

/// Clamped leaky-bucket energy regulator.
///
/// `E` is stored as fixed-point (millis of a unit) in an `AtomicI64` so that
/// `level()` can be read from any thread without a lock, even though only the
/// sensitive loop is supposed to mutate it. Mutating methods take `&self`
/// (not `&mut self`) for the same reason the teacher's `AppState` holds
/// everything behind `Arc<...>` — the regulator lives inside the shared
/// core handle.
pub struct EnergyRegulator {
    raw_millis: AtomicI64,
    e_min: f64,
    e_max: f64,
    replenish_rate: f64,
}

const SCALE: f64 = 1000.0;

impl EnergyRegulator {
    pub fn new(initial: f64, e_min: f64, e_max: f64, replenish_rate: f64) -> Self {
        let clamped = initial.clamp(e_min, e_max);
        Self {
            raw_millis: AtomicI64::new((clamped * SCALE).round() as i64),
            e_min,
            e_max,
            replenish_rate,
        }
    }

    pub fn from_config(cfg: &crate::config::EnergyConfig) -> Self {
        Self::new(cfg.e_max, cfg.e_min, cfg.e_max, cfg.replenish_rate)
    }

    pub fn e_min(&self) -> f64 {
        self.e_min
    }

    pub fn e_max(&self) -> f64 {
        self.e_max
    }

    pub fn replenish_rate(&self) -> f64 {
        self.replenish_rate
    }

    pub fn level(&self) -> f64 {
        self.raw_millis.load(Ordering::SeqCst) as f64 / SCALE
    }

    /// `round(clamp(E, 0, E_max) * 100 / E_max)` — spec §4.A.
    pub fn percentage(&self) -> u8 {
        if self.e_max <= 0.0 {
            return 0;
        }
        let e = self.level().clamp(0.0, self.e_max);
        ((e * 100.0 / self.e_max).round()) as u8
    }

    pub fn status(&self) -> EnergyStatus {
        EnergyStatus::classify(self.level())
    }

    pub fn snapshot(&self) -> EnergySnapshot {
        EnergySnapshot {
            current: self.level(),
            percentage: self.percentage(),
            status: self.status(),
            as_of: Utc::now(),
        }
    }

    /// `E <- clamp(E - amount, E_min, E_max)`. Total: never fails, even for
    /// a negative or NaN `amount` (treated as zero charge). At `E == E_min`
    /// this is a no-op on `E` but the attempted charge is still returned so
    /// the caller can still attribute it to a conversation/app (spec §8
    /// boundary: "E = E_min: consume is a no-op on E but still recorded as
    /// an attempted charge").
    pub fn consume(&self, amount: f64) -> f64 {
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        self.apply_delta(-amount);
        amount
    }

    /// `E <- clamp(E + r*duration_s, E_min, E_max)`.
    pub fn replenish(&self, duration_s: f64) -> f64 {
        let duration_s = if duration_s.is_finite() { duration_s.max(0.0) } else { 0.0 };
        let delta = self.replenish_rate * duration_s;
        self.apply_delta(delta);
        delta
    }

    fn apply_delta(&self, delta: f64) {
        let delta_millis = (delta * SCALE).round() as i64;
        let min_millis = (self.e_min * SCALE).round() as i64;
        let max_millis = (self.e_max * SCALE).round() as i64;

        self.raw_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some((cur + delta_millis).clamp(min_millis, max_millis))
            })
            .ok();
    }

    /// Sleep duration clamped to `[sleep_min, sleep_max]`, proportional to
    /// the deficit to a target level (spec §4.F step 8).
    pub fn recovery_sleep_seconds(&self, target: f64, sleep_min: f64, sleep_max: f64) -> f64 {
        if self.replenish_rate <= 0.0 {
            return sleep_max;
        }
        let deficit = (target - self.level()).max(0.0);
        (deficit / self.replenish_rate).clamp(sleep_min, sleep_max)
    }
}
