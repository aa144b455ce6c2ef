// src/store/sqlite.rs
// SQLite-backed ConversationStore (spec §4.B, §6 persistent schema).
//
// Schema mirrors spec.md §6: `conversations` plus `responses`, keyed by
// `request_id`. Migrations are inline `CREATE TABLE IF NOT EXISTS`
// statements run once at startup, the way the teacher's storage modules do
// it rather than reaching for a separate migration runner.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

use crate::error::{Result, SynapseError};

use super::models::{derive_budget, ConversationState};
use super::{
    AddResponseRequest, BudgetStatus, Conversation, ConversationSummary, ListFilter, ResponseEntry,
};
use super::ConversationStore;

pub struct SqliteConversationStore {
    pool: SqlitePool,
}

impl SqliteConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                request_id TEXT PRIMARY KEY,
                input_message TEXT NOT NULL,
                app_id TEXT,
                budget REAL,
                total_energy_consumed REAL NOT NULL DEFAULT 0,
                sleep_cycles INTEGER NOT NULL DEFAULT 0,
                model_switches INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL DEFAULT 'active',
                snooze_until INTEGER,
                ended_reason TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS responses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL REFERENCES conversations(request_id),
                timestamp_millis INTEGER NOT NULL,
                content TEXT NOT NULL,
                energy_level REAL NOT NULL,
                model_used TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_responses_request_id ON responses(request_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_conversations_app_id ON conversations(app_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_responses_timestamp ON responses(timestamp_millis)")
            .execute(&self.pool)
            .await?;

        debug!("[store] conversation schema ready");
        Ok(())
    }

    async fn row_to_conversation(&self, row: sqlx::sqlite::SqliteRow) -> Result<Conversation> {
        let request_id: String = row.get("request_id");
        let responses = self.fetch_responses(&request_id).await?;

        Ok(Conversation {
            request_id: request_id.clone(),
            input_message: row.get("input_message"),
            app_id: row.get("app_id"),
            budget: row.get("budget"),
            total_energy_consumed: row.get("total_energy_consumed"),
            sleep_cycles: row.get::<i64, _>("sleep_cycles") as u64,
            model_switches: row.get::<i64, _>("model_switches") as u64,
            state: ConversationState::from_str(row.get::<&str, _>("state"))
                .unwrap_or(ConversationState::Active),
            snooze_until: row
                .get::<Option<i64>, _>("snooze_until")
                .and_then(|ts| Utc.timestamp_millis_opt(ts).single()),
            ended_reason: row.get("ended_reason"),
            responses,
            created_at: Utc
                .timestamp_millis_opt(row.get::<i64, _>("created_at"))
                .single()
                .unwrap_or_else(Utc::now),
        })
    }

    async fn fetch_responses(&self, request_id: &str) -> Result<Vec<ResponseEntry>> {
        let rows = sqlx::query(
            "SELECT timestamp_millis, content, energy_level, model_used FROM responses \
             WHERE request_id = ? ORDER BY timestamp_millis ASC",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ResponseEntry {
                timestamp: Utc
                    .timestamp_millis_opt(r.get("timestamp_millis"))
                    .single()
                    .unwrap_or_else(Utc::now),
                content: r.get("content"),
                energy_level: r.get("energy_level"),
                model_used: r.get("model_used"),
            })
            .collect())
    }

    /// Next strictly-increasing timestamp for a conversation's response log
    /// (spec §8 invariant 8). Using millis directly from `Utc::now()` can
    /// collide when two responses commit within the same millisecond; bump
    /// past the last recorded value when that happens.
    async fn next_response_timestamp_millis(&self, request_id: &str) -> Result<i64> {
        let now = Utc::now().timestamp_millis();
        let last: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(timestamp_millis) FROM responses WHERE request_id = ?",
        )
        .bind(request_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(match last {
            Some(last) if last >= now => last + 1,
            _ => now,
        })
    }

    fn summary_row(row: &sqlx::sqlite::SqliteRow) -> ConversationSummary {
        let budget: Option<f64> = row.get("budget");
        let total: f64 = row.get("total_energy_consumed");
        let (_, budget_status) = derive_budget(budget, total);
        ConversationSummary {
            request_id: row.get("request_id"),
            app_id: row.get("app_id"),
            state: ConversationState::from_str(row.get::<&str, _>("state"))
                .unwrap_or(ConversationState::Active),
            budget_status,
            total_energy_consumed: total,
            last_response_at: None,
        }
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn add_response(&self, req: AddResponseRequest) -> Result<()> {
        if let Some(b) = req.budget {
            if b < 0.0 {
                return Err(SynapseError::InvalidBudget(b));
            }
        }

        let existing: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM conversations WHERE request_id = ?")
                .bind(&req.request_id)
                .fetch_optional(&self.pool)
                .await?;

        if existing.is_none() {
            sqlx::query(
                r#"
                INSERT INTO conversations
                    (request_id, input_message, app_id, budget, total_energy_consumed,
                     sleep_cycles, model_switches, state, created_at)
                VALUES (?, ?, ?, ?, 0, 0, 0, 'active', ?)
                "#,
            )
            .bind(&req.request_id)
            .bind(req.user_message.clone().unwrap_or_default())
            .bind(req.app_id.clone())
            .bind(req.budget)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await?;
        } else if req.budget.is_some() || req.app_id.is_some() {
            // Recompute remaining/budgetStatus is purely derived, so we only
            // need to persist the updated budget/app binding itself.
            if let Some(b) = req.budget {
                sqlx::query("UPDATE conversations SET budget = ? WHERE request_id = ?")
                    .bind(b)
                    .bind(&req.request_id)
                    .execute(&self.pool)
                    .await?;
            }
            if let Some(app_id) = &req.app_id {
                sqlx::query(
                    "UPDATE conversations SET app_id = COALESCE(app_id, ?) WHERE request_id = ?",
                )
                .bind(app_id)
                .bind(&req.request_id)
                .execute(&self.pool)
                .await?;
            }
        }

        if req.energy_charge > 0.0 {
            sqlx::query(
                "UPDATE conversations SET total_energy_consumed = total_energy_consumed + ? \
                 WHERE request_id = ?",
            )
            .bind(req.energy_charge)
            .bind(&req.request_id)
            .execute(&self.pool)
            .await?;
        }

        if let Some(content) = req.response_text.clone() {
            let ts = self.next_response_timestamp_millis(&req.request_id).await?;
            sqlx::query(
                "INSERT INTO responses (request_id, timestamp_millis, content, energy_level, model_used) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&req.request_id)
            .bind(ts)
            .bind(content)
            .bind(req.energy_level)
            .bind(req.model_used.clone())
            .execute(&self.pool)
            .await?;
        } else if existing.is_none() {
            // Seed row for the originating user message, zero-charge,
            // satisfying spec §8 invariant 5 (conversation_created is
            // eventually followed by a user-role message_added).
            let ts = self.next_response_timestamp_millis(&req.request_id).await?;
            sqlx::query(
                "INSERT INTO responses (request_id, timestamp_millis, content, energy_level, model_used) \
                 VALUES (?, ?, ?, ?, NULL)",
            )
            .bind(&req.request_id)
            .bind(ts)
            .bind(req.user_message.clone().unwrap_or_default())
            .bind(req.energy_level)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn get_conversation(&self, request_id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query("SELECT * FROM conversations WHERE request_id = ?")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.row_to_conversation(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_recent_conversations(&self, limit: usize) -> Result<Vec<ConversationSummary>> {
        self.list_conversations(ListFilter {
            limit,
            state: None,
            budget_status: None,
        })
        .await
    }

    async fn get_conversations_by_app(
        &self,
        app_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE app_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(app_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::summary_row).collect())
    }

    async fn get_pending_messages_by_app(&self, app_id: &str) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE app_id = ? AND state = 'active' \
             ORDER BY created_at ASC",
        )
        .bind(app_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::summary_row).collect())
    }

    async fn list_conversations(&self, filter: ListFilter) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query("SELECT * FROM conversations ORDER BY created_at DESC LIMIT ?")
            .bind((filter.limit.min(100)) as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(Self::summary_row)
            .filter(|s| filter.state.map(|st| st == s.state).unwrap_or(true))
            .filter(|s| {
                filter
                    .budget_status
                    .map(|bs| Some(bs) == s.budget_status)
                    .unwrap_or(true)
            })
            .collect())
    }

    async fn set_energy_budget(&self, request_id: &str, budget: f64) -> Result<()> {
        if budget < 0.0 {
            return Err(SynapseError::InvalidBudget(budget));
        }
        let affected = sqlx::query("UPDATE conversations SET budget = ? WHERE request_id = ?")
            .bind(budget)
            .bind(request_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(SynapseError::ConversationNotFound(request_id.to_string()));
        }
        Ok(())
    }

    async fn get_remaining_budget(&self, request_id: &str) -> Result<Option<f64>> {
        let conv = self
            .get_conversation(request_id)
            .await?
            .ok_or_else(|| SynapseError::ConversationNotFound(request_id.to_string()))?;
        Ok(conv.remaining())
    }

    async fn get_budget_status(&self, request_id: &str) -> Result<Option<BudgetStatus>> {
        let conv = self
            .get_conversation(request_id)
            .await?
            .ok_or_else(|| SynapseError::ConversationNotFound(request_id.to_string()))?;
        Ok(conv.budget_status())
    }

    async fn increment_model_switches(&self, request_id: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET model_switches = model_switches + 1 WHERE request_id = ?")
            .bind(request_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn increment_sleep_cycles(&self, request_id: &str) -> Result<()> {
        sqlx::query("UPDATE conversations SET sleep_cycles = sleep_cycles + 1 WHERE request_id = ?")
            .bind(request_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn end_conversation(&self, request_id: &str, reason: &str) -> Result<()> {
        let affected = sqlx::query(
            "UPDATE conversations SET state = 'ended', ended_reason = ? \
             WHERE request_id = ? AND state != 'ended'",
        )
        .bind(reason)
        .bind(request_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            warn!(
                "[store] end_conversation('{}') was a no-op (unknown or already ended)",
                request_id
            );
        }
        Ok(())
    }

    async fn snooze_conversation(&self, request_id: &str, wake_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE conversations SET state = 'snoozed', snooze_until = ? \
             WHERE request_id = ? AND state = 'active'",
        )
        .bind(wake_at.timestamp_millis())
        .bind(request_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn wake_if_due(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT request_id FROM conversations WHERE state = 'snoozed' AND snooze_until <= ?",
        )
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<String> = rows.iter().map(|r| r.get("request_id")).collect();

        if !ids.is_empty() {
            sqlx::query(
                "UPDATE conversations SET state = 'active', snooze_until = NULL \
                 WHERE state = 'snoozed' AND snooze_until <= ?",
            )
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await?;
        }

        Ok(ids)
    }

    async fn list_active(&self) -> Result<Vec<Conversation>> {
        let rows = sqlx::query("SELECT * FROM conversations WHERE state = 'active'")
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.row_to_conversation(row).await?);
        }
        Ok(out)
    }

    async fn count_conversations(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_responses(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM responses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn avg_energy_level(&self) -> Result<f64> {
        let avg: Option<f64> = sqlx::query_scalar("SELECT AVG(energy_level) FROM responses")
            .fetch_one(&self.pool)
            .await?;
        Ok(avg.unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteConversationStore {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteConversationStore::new(pool);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn add_response_is_idempotent_on_creation() {
        let store = test_store().await;
        store
            .add_response(AddResponseRequest {
                request_id: "r1".into(),
                user_message: Some("hi".into()),
                budget: Some(5.0),
                app_id: Some("chat".into()),
                energy_level: 100.0,
                ..Default::default()
            })
            .await
            .unwrap();

        store
            .add_response(AddResponseRequest {
                request_id: "r1".into(),
                budget: Some(5.0),
                energy_level: 95.0,
                ..Default::default()
            })
            .await
            .unwrap();

        let conv = store.get_conversation("r1").await.unwrap().unwrap();
        assert_eq!(conv.budget, Some(5.0));
        assert_eq!(conv.app_id.as_deref(), Some("chat"));
    }

    #[tokio::test]
    async fn negative_budget_is_rejected() {
        let store = test_store().await;
        let err = store
            .add_response(AddResponseRequest {
                request_id: "r2".into(),
                budget: Some(-1.0),
                energy_level: 100.0,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SynapseError::InvalidBudget(_)));
    }

    #[tokio::test]
    async fn responses_have_strictly_increasing_timestamps() {
        let store = test_store().await;
        store
            .add_response(AddResponseRequest {
                request_id: "r3".into(),
                user_message: Some("hi".into()),
                energy_level: 100.0,
                energy_charge: 0.0,
                ..Default::default()
            })
            .await
            .unwrap();

        for i in 0..5 {
            store
                .add_response(AddResponseRequest {
                    request_id: "r3".into(),
                    response_text: Some(format!("reply {i}")),
                    energy_level: 90.0,
                    energy_charge: 1.0,
                    model_used: Some("small".into()),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let conv = store.get_conversation("r3").await.unwrap().unwrap();
        assert_eq!(conv.total_energy_consumed, 5.0);
        let timestamps: Vec<_> = conv.responses.iter().map(|r| r.timestamp).collect();
        let mut sorted = timestamps.clone();
        sorted.sort();
        assert_eq!(timestamps, sorted);
        for w in timestamps.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[tokio::test]
    async fn zero_budget_is_depleted() {
        let store = test_store().await;
        store
            .add_response(AddResponseRequest {
                request_id: "r4".into(),
                user_message: Some("server down".into()),
                budget: Some(0.0),
                energy_level: 100.0,
                ..Default::default()
            })
            .await
            .unwrap();

        let conv = store.get_conversation("r4").await.unwrap().unwrap();
        assert!(conv.is_last_chance());
        assert_eq!(conv.budget_status(), Some(BudgetStatus::Depleted));
    }

    #[tokio::test]
    async fn snooze_and_wake() {
        let store = test_store().await;
        store
            .add_response(AddResponseRequest {
                request_id: "r5".into(),
                user_message: Some("later".into()),
                energy_level: 100.0,
                ..Default::default()
            })
            .await
            .unwrap();

        let wake_at = Utc::now() - chrono::Duration::seconds(1);
        store.snooze_conversation("r5", wake_at).await.unwrap();

        let conv = store.get_conversation("r5").await.unwrap().unwrap();
        assert_eq!(conv.state, ConversationState::Snoozed);

        let woken = store.wake_if_due(Utc::now()).await.unwrap();
        assert_eq!(woken, vec!["r5".to_string()]);

        let conv = store.get_conversation("r5").await.unwrap().unwrap();
        assert_eq!(conv.state, ConversationState::Active);
    }

    #[tokio::test]
    async fn ended_is_terminal_and_non_fatal_to_reapply() {
        let store = test_store().await;
        store
            .add_response(AddResponseRequest {
                request_id: "r6".into(),
                user_message: Some("bye".into()),
                energy_level: 100.0,
                ..Default::default()
            })
            .await
            .unwrap();
        store.end_conversation("r6", "done").await.unwrap();
        store.end_conversation("r6", "done-again").await.unwrap();

        let conv = store.get_conversation("r6").await.unwrap().unwrap();
        assert_eq!(conv.state, ConversationState::Ended);
        assert_eq!(conv.ended_reason.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn list_filter_clamps_limit() {
        assert_eq!(ListFilter::clamp_limit(Some(500)), 100);
        assert_eq!(ListFilter::clamp_limit(Some(-5)), 10);
        assert_eq!(ListFilter::clamp_limit(None), 10);
        assert_eq!(ListFilter::clamp_limit(Some(42)), 42);
    }
}
