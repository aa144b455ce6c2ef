// src/store/models.rs
// Conversation data model and derived fields (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::energy::EnergyStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Active,
    Snoozed,
    Ended,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Active => "active",
            ConversationState::Snoozed => "snoozed",
            ConversationState::Ended => "ended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ConversationState::Active),
            "snoozed" => Some(ConversationState::Snoozed),
            "ended" => Some(ConversationState::Ended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Within,
    Exceeded,
    Depleted,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Within => "within",
            BudgetStatus::Exceeded => "exceeded",
            BudgetStatus::Depleted => "depleted",
        }
    }
}

/// Derive `remaining`/`budgetStatus` from a `budget`/`totalEnergyConsumed`
/// pair, per spec §3: `depleted ⇔ budget==0`, `exceeded ⇔ remaining<=0 ∧
/// budget>0`, otherwise `within`.
pub fn derive_budget(budget: Option<f64>, total_consumed: f64) -> (Option<f64>, Option<BudgetStatus>) {
    match budget {
        None => (None, None),
        Some(b) if b == 0.0 => (Some(0.0 - total_consumed), Some(BudgetStatus::Depleted)),
        Some(b) => {
            let remaining = b - total_consumed;
            let status = if remaining <= 0.0 {
                BudgetStatus::Exceeded
            } else {
                BudgetStatus::Within
            };
            (Some(remaining), Some(status))
        }
    }
}

/// One stored assistant/system response row (spec §3 `responses`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub energy_level: f64,
    pub model_used: Option<String>,
}

/// Full conversation record with derived fields, as returned by
/// `getConversation` (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub request_id: String,
    pub input_message: String,
    pub app_id: Option<String>,
    pub budget: Option<f64>,
    pub total_energy_consumed: f64,
    pub sleep_cycles: u64,
    pub model_switches: u64,
    pub state: ConversationState,
    pub snooze_until: Option<DateTime<Utc>>,
    pub ended_reason: Option<String>,
    pub responses: Vec<ResponseEntry>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn remaining(&self) -> Option<f64> {
        derive_budget(self.budget, self.total_energy_consumed).0
    }

    pub fn budget_status(&self) -> Option<BudgetStatus> {
        derive_budget(self.budget, self.total_energy_consumed).1
    }

    /// Severity used by the loop's ephemeral status message (spec §4.F
    /// step 4): `depleted`, `exceeded`, `<20% remaining`, or `ok`.
    pub fn budget_warning(&self) -> BudgetWarning {
        match (self.budget, self.budget_status()) {
            (_, Some(BudgetStatus::Depleted)) => BudgetWarning::Depleted,
            (_, Some(BudgetStatus::Exceeded)) => BudgetWarning::Exceeded,
            (Some(b), Some(BudgetStatus::Within)) if b > 0.0 => {
                let remaining = self.remaining().unwrap_or(0.0);
                if remaining / b < 0.20 {
                    BudgetWarning::Low
                } else {
                    BudgetWarning::Ok
                }
            }
            _ => BudgetWarning::Ok,
        }
    }

    pub fn is_last_chance(&self) -> bool {
        self.budget == Some(0.0)
    }

    /// Point-in-time composite read for `getConversation`, grounded on the
    /// teacher's `BudgetTracker::get_budget_status` (current total, remaining,
    /// status bundled in one value rather than three separate field reads).
    pub fn budget_snapshot(&self) -> BudgetSnapshot {
        let (remaining, status) = derive_budget(self.budget, self.total_energy_consumed);
        BudgetSnapshot { budget: self.budget, total_energy_consumed: self.total_energy_consumed, remaining, status }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub budget: Option<f64>,
    pub total_energy_consumed: f64,
    pub remaining: Option<f64>,
    pub status: Option<BudgetStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetWarning {
    Depleted,
    Exceeded,
    Low,
    Ok,
}

/// Summary row for `listConversations`/`getRecentConversations` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub request_id: String,
    pub app_id: Option<String>,
    pub state: ConversationState,
    pub budget_status: Option<BudgetStatus>,
    pub total_energy_consumed: f64,
    pub last_response_at: Option<DateTime<Utc>>,
}

impl From<&Conversation> for ConversationSummary {
    fn from(c: &Conversation) -> Self {
        Self {
            request_id: c.request_id.clone(),
            app_id: c.app_id.clone(),
            state: c.state,
            budget_status: c.budget_status(),
            total_energy_consumed: c.total_energy_consumed,
            last_response_at: c.responses.last().map(|r| r.timestamp),
        }
    }
}

/// Filters accepted by `listConversations` (spec §6). Unknown values for
/// `state`/`budget_status` must be rejected by the caller as `ErrBadRequest`
/// before constructing this — see `crate::core::ListConversationsFilter::validated`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub limit: usize,
    pub state: Option<ConversationState>,
    pub budget_status: Option<BudgetStatus>,
}

impl ListFilter {
    /// Clamp `limit` per spec §8 boundary: `>=101 -> 100`; negative or
    /// non-integer inputs are the caller's problem before reaching here, so
    /// this only handles the documented clamp-to-100 and default-to-10 cases.
    pub fn clamp_limit(requested: Option<i64>) -> usize {
        match requested {
            Some(n) if n < 0 => 10,
            Some(n) if n >= 101 => 100,
            Some(n) => n as usize,
            None => 10,
        }
    }
}

/// Associates the loop's cheap energy snapshot with a percentage/status pair,
/// used by `addResponse` to stamp each response row.
pub fn energy_level_for(e: f64) -> f64 {
    e
}

pub fn status_label(e: f64) -> &'static str {
    EnergyStatus::classify(e).as_str()
}
