// src/apps/energy_window.rs
// Per-app rolling energy window (spec §3 `energyWindow`, §4.C `getEnergyMetrics`).
//
// Grounded on the teacher's `BudgetTracker::get_usage_since` pattern
// (examples/ConaryLabs-Mira/backend/src/budget/mod.rs): an append-only
// buffer scanned by time predicate rather than a dedicated timeseries store.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct EnergyEvent {
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub conversation_id: Option<String>,
    pub operation: Option<String>,
}

/// `{total, last24h, last1h, last1min}` (spec §4.C).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct EnergyMetrics {
    pub total: f64,
    pub last24h: f64,
    pub last1h: f64,
    pub last1min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl AppHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppHealth::Healthy => "healthy",
            AppHealth::Degraded => "degraded",
            AppHealth::Unhealthy => "unhealthy",
        }
    }
}

/// `unhealthy` if `last1min > 50`, `degraded` if `last1h > 200`, else
/// `healthy` (spec §4.C; thresholds are tunable constants).
pub fn classify(metrics: &EnergyMetrics) -> AppHealth {
    if metrics.last1min > 50.0 {
        AppHealth::Unhealthy
    } else if metrics.last1h > 200.0 {
        AppHealth::Degraded
    } else {
        AppHealth::Healthy
    }
}

/// Bounded append-only buffer of energy events for one app. Pruned lazily on
/// write so memory stays proportional to one day of traffic, not the app's
/// lifetime.
#[derive(Debug, Default)]
pub struct EnergyWindow {
    events: VecDeque<EnergyEvent>,
    total_all_time: f64,
}

impl EnergyWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, amount: f64, conversation_id: Option<String>, operation: Option<String>) {
        let now = Utc::now();
        self.total_all_time += amount;
        self.events.push_back(EnergyEvent {
            timestamp: now,
            amount,
            conversation_id,
            operation,
        });
        self.prune(now);
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(24);
        while matches!(self.events.front(), Some(e) if e.timestamp < cutoff) {
            self.events.pop_front();
        }
    }

    pub fn metrics(&self) -> EnergyMetrics {
        let now = Utc::now();
        let mut last24h = 0.0;
        let mut last1h = 0.0;
        let mut last1min = 0.0;

        for e in &self.events {
            let age = now - e.timestamp;
            if age <= Duration::hours(24) {
                last24h += e.amount;
            }
            if age <= Duration::hours(1) {
                last1h += e.amount;
            }
            if age <= Duration::minutes(1) {
                last1min += e.amount;
            }
        }

        EnergyMetrics {
            total: self.total_all_time,
            last24h,
            last1h,
            last1min,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_accumulate_across_the_window() {
        let mut w = EnergyWindow::new();
        w.push(5.0, Some("c1".into()), Some("respond".into()));
        w.push(3.0, None, None);

        let m = w.metrics();
        assert_eq!(m.total, 8.0);
        assert_eq!(m.last1min, 8.0);
        assert_eq!(m.last1h, 8.0);
        assert_eq!(m.last24h, 8.0);
    }

    #[test]
    fn health_thresholds() {
        let healthy = EnergyMetrics { total: 1.0, last24h: 1.0, last1h: 1.0, last1min: 1.0 };
        assert_eq!(classify(&healthy), AppHealth::Healthy);

        let degraded = EnergyMetrics { total: 0.0, last24h: 0.0, last1h: 201.0, last1min: 0.0 };
        assert_eq!(classify(&degraded), AppHealth::Degraded);

        let unhealthy = EnergyMetrics { total: 0.0, last24h: 0.0, last1h: 0.0, last1min: 51.0 };
        assert_eq!(classify(&unhealthy), AppHealth::Unhealthy);
    }
}
