// src/store/mod.rs
// Conversation store contract (spec §4.B).

pub mod models;
pub mod sqlite;

pub use models::{
    derive_budget, BudgetSnapshot, BudgetStatus, BudgetWarning, Conversation, ConversationState,
    ConversationSummary, ListFilter, ResponseEntry,
};
pub use sqlite::SqliteConversationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Arguments to `addResponse` (spec §4.B). Idempotent creation on first call
/// for a given `request_id`; subsequent calls append a response row.
#[derive(Debug, Clone, Default)]
pub struct AddResponseRequest {
    pub request_id: String,
    pub user_message: Option<String>,
    pub response_text: Option<String>,
    pub energy_level: f64,
    pub model_used: Option<String>,
    pub budget: Option<f64>,
    pub app_id: Option<String>,
    /// Energy to attribute to `total_energy_consumed` for this call. Zero is
    /// legal (e.g. the seeding user-message row).
    pub energy_charge: f64,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn add_response(&self, req: AddResponseRequest) -> Result<()>;

    async fn get_conversation(&self, request_id: &str) -> Result<Option<Conversation>>;

    async fn get_recent_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>>;

    async fn get_conversations_by_app(
        &self,
        app_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>>;

    async fn get_pending_messages_by_app(&self, app_id: &str) -> Result<Vec<ConversationSummary>>;

    async fn list_conversations(&self, filter: ListFilter) -> Result<Vec<ConversationSummary>>;

    async fn set_energy_budget(&self, request_id: &str, budget: f64) -> Result<()>;

    async fn get_remaining_budget(&self, request_id: &str) -> Result<Option<f64>>;

    async fn get_budget_status(&self, request_id: &str) -> Result<Option<BudgetStatus>>;

    /// Bumps the observability counter on a cycle that switched models while
    /// this conversation was focused (spec §4.F step 7).
    async fn increment_model_switches(&self, request_id: &str) -> Result<()>;

    /// Bumps the observability counter on a cycle that slept while this
    /// conversation was focused (spec §4.F step 8).
    async fn increment_sleep_cycles(&self, request_id: &str) -> Result<()>;

    async fn end_conversation(&self, request_id: &str, reason: &str) -> Result<()>;

    async fn snooze_conversation(&self, request_id: &str, wake_at: DateTime<Utc>) -> Result<()>;

    /// Transitions every due `snoozed` conversation to `active`, returning
    /// the ids woken (spec §4.F step 2).
    async fn wake_if_due(&self, now: DateTime<Utc>) -> Result<Vec<String>>;

    /// All currently `active` conversations, for the loop's focus picker
    /// (spec §4.F step 3).
    async fn list_active(&self) -> Result<Vec<Conversation>>;

    /// Aggregate counters for `getStats()` (spec §6).
    async fn count_conversations(&self) -> Result<u64>;
    async fn count_responses(&self) -> Result<u64>;
    async fn avg_energy_level(&self) -> Result<f64>;
}
