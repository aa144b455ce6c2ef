// src/apps/mod.rs
// App Registry: lifecycle, routing and per-app energy accounting (spec §4.C).

pub mod chat;
pub mod energy_window;
pub mod http;

pub use chat::{ChatApp, CHAT_APP_ID};
pub use energy_window::{classify, AppHealth, EnergyMetrics, EnergyWindow};
pub use http::HttpApp;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, SynapseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppType {
    InProcess,
    Mcp,
    Http,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::InProcess => "in-process",
            AppType::Mcp => "mcp",
            AppType::Http => "http",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in-process" => Some(AppType::InProcess),
            "mcp" => Some(AppType::Mcp),
            "http" => Some(AppType::Http),
            _ => None,
        }
    }
}

/// Install-time configuration for one app (spec §3, §6 `installApp`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_id: String,
    pub app_type: AppType,
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub hourly_energy_budget: Option<f64>,
    pub daily_energy_budget: Option<f64>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.app_type == AppType::Http && self.endpoint.is_none() {
            return Err(SynapseError::MissingEndpoint);
        }
        Ok(())
    }
}

/// A message routed between the loop and an app (spec §4.F step 6,
/// `AppMessage{from,to,content}`).
#[derive(Debug, Clone)]
pub struct AppMessage {
    pub from: String,
    pub to: String,
    pub content: Value,
}

/// An installed app's live instance. Chat is the only type with an
/// in-process instance shipped in this crate; `mcp`/`http` apps register
/// their own adapter via `AppRegistry::register_app`.
#[async_trait]
pub trait App: Send + Sync {
    fn app_id(&self) -> &str;

    async fn receive_message(&self, msg: AppMessage) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSummary {
    pub app_id: String,
    pub app_type: AppType,
    pub enabled: bool,
    pub running: bool,
    pub endpoint: Option<String>,
    pub energy: EnergyMetrics,
    pub health: AppHealth,
}

#[derive(Clone)]
struct AppRow {
    config: AppConfig,
    running: bool,
}

pub struct AppRegistry {
    pool: SqlitePool,
    rows: RwLock<HashMap<String, AppRow>>,
    windows: RwLock<HashMap<String, EnergyWindow>>,
    instances: RwLock<HashMap<String, Arc<dyn App>>>,
}

impl AppRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            rows: RwLock::new(HashMap::new()),
            windows: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
        }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS apps (
                app_id TEXT PRIMARY KEY,
                app_type TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                running INTEGER NOT NULL DEFAULT 0,
                endpoint TEXT,
                hourly_energy_budget REAL,
                daily_energy_budget REAL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS app_energy (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                app_id TEXT NOT NULL REFERENCES apps(app_id),
                timestamp_millis INTEGER NOT NULL,
                amount REAL NOT NULL,
                conversation_id TEXT,
                operation TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS app_conversations (
                conversation_id TEXT NOT NULL,
                app_id TEXT NOT NULL,
                UNIQUE(conversation_id, app_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_app_energy_app_id ON app_energy(app_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_app_energy_timestamp ON app_energy(timestamp_millis)")
            .execute(&self.pool)
            .await?;

        // Load any previously installed apps back into memory.
        let rows = sqlx::query("SELECT * FROM apps").fetch_all(&self.pool).await?;
        let mut guard = self.rows.write().await;
        for row in rows {
            let app_type = AppType::from_str(row.get::<&str, _>("app_type")).unwrap_or(AppType::InProcess);
            let config = AppConfig {
                app_id: row.get("app_id"),
                app_type,
                enabled: row.get::<i64, _>("enabled") != 0,
                endpoint: row.get("endpoint"),
                hourly_energy_budget: row.get("hourly_energy_budget"),
                daily_energy_budget: row.get("daily_energy_budget"),
            };
            guard.insert(
                config.app_id.clone(),
                AppRow { config, running: row.get::<i64, _>("running") != 0 },
            );
        }
        Ok(())
    }

    pub async fn install(&self, config: AppConfig) -> Result<()> {
        config.validate()?;

        {
            let guard = self.rows.read().await;
            if guard.contains_key(&config.app_id) {
                return Err(SynapseError::AlreadyInstalled(config.app_id.clone()));
            }
        }

        sqlx::query(
            "INSERT INTO apps (app_id, app_type, enabled, running, endpoint, hourly_energy_budget, daily_energy_budget) \
             VALUES (?, ?, 1, 0, ?, ?, ?)",
        )
        .bind(&config.app_id)
        .bind(config.app_type.as_str())
        .bind(&config.endpoint)
        .bind(config.hourly_energy_budget)
        .bind(config.daily_energy_budget)
        .execute(&self.pool)
        .await?;

        info!("[apps] installed '{}' ({})", config.app_id, config.app_type.as_str());

        self.rows.write().await.insert(
            config.app_id.clone(),
            AppRow { config, running: false },
        );
        Ok(())
    }

    /// Uninstalling an app does not cascade-delete its conversations; they
    /// are orphaned and the loop falls back to the default chat app for
    /// routing (spec §3 invariant).
    pub async fn uninstall(&self, app_id: &str) -> Result<()> {
        let existed = self.rows.write().await.remove(app_id).is_some();
        if !existed {
            return Err(SynapseError::UnknownApp(app_id.to_string()));
        }
        self.instances.write().await.remove(app_id);
        sqlx::query("DELETE FROM apps WHERE app_id = ?")
            .bind(app_id)
            .execute(&self.pool)
            .await?;
        info!("[apps] uninstalled '{}'", app_id);
        Ok(())
    }

    /// Binds a live `App` instance to an already-installed `appId`.
    pub async fn register_app(&self, instance: Arc<dyn App>) -> Result<()> {
        let app_id = instance.app_id().to_string();
        {
            let guard = self.rows.read().await;
            if !guard.contains_key(&app_id) {
                return Err(SynapseError::UnknownApp(app_id));
            }
        }
        if let Some(row) = self.rows.write().await.get_mut(&app_id) {
            row.running = true;
        }
        sqlx::query("UPDATE apps SET running = 1 WHERE app_id = ?")
            .bind(&app_id)
            .execute(&self.pool)
            .await?;
        self.instances.write().await.insert(app_id, instance);
        Ok(())
    }

    /// Idempotent via `UNIQUE(conversation_id, app_id)` (spec §4.C).
    pub async fn associate_conversation(&self, conversation_id: &str, app_id: &str) -> Result<()> {
        if !self.rows.read().await.contains_key(app_id) {
            return Err(SynapseError::UnknownApp(app_id.to_string()));
        }
        sqlx::query("INSERT OR IGNORE INTO app_conversations (conversation_id, app_id) VALUES (?, ?)")
            .bind(conversation_id)
            .bind(app_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Refuses to route when `m.to == "loop"` (spec §4.C).
    pub async fn route_message(&self, msg: AppMessage) -> Result<()> {
        if msg.to == "loop" {
            return Err(SynapseError::RouteToLoopForbidden);
        }
        let instance = self.instances.read().await.get(&msg.to).cloned();
        match instance {
            Some(app) => app.receive_message(msg).await,
            None => {
                warn!("[apps] route_message to unregistered app '{}' dropped", msg.to);
                Err(SynapseError::AppNotFound(msg.to))
            }
        }
    }

    /// Appends to the app's in-memory rolling window and asynchronously
    /// persists an event row (spec §4.C `recordEnergy`).
    pub async fn record_energy(
        &self,
        app_id: &str,
        amount: f64,
        conversation_id: Option<String>,
        operation: Option<String>,
    ) -> Result<()> {
        {
            let mut windows = self.windows.write().await;
            windows
                .entry(app_id.to_string())
                .or_insert_with(EnergyWindow::new)
                .push(amount, conversation_id.clone(), operation.clone());
        }

        let pool = self.pool.clone();
        let app_id = app_id.to_string();
        tokio::spawn(async move {
            let result = sqlx::query(
                "INSERT INTO app_energy (app_id, timestamp_millis, amount, conversation_id, operation) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&app_id)
            .bind(chrono::Utc::now().timestamp_millis())
            .bind(amount)
            .bind(conversation_id)
            .bind(operation)
            .execute(&pool)
            .await;

            if let Err(e) = result {
                warn!("[apps] failed to persist energy event for '{}': {}", app_id, e);
            }
        });

        Ok(())
    }

    /// Computed from the in-memory window if present, otherwise from the
    /// persisted series via bounded time-predicate scans (spec §4.C).
    pub async fn get_energy_metrics(&self, app_id: &str) -> Result<EnergyMetrics> {
        if let Some(window) = self.windows.read().await.get(app_id) {
            return Ok(window.metrics());
        }

        let now = chrono::Utc::now();
        let cutoff_24h = (now - chrono::Duration::hours(24)).timestamp_millis();
        let cutoff_1h = (now - chrono::Duration::hours(1)).timestamp_millis();
        let cutoff_1min = (now - chrono::Duration::minutes(1)).timestamp_millis();

        let total: Option<f64> =
            sqlx::query_scalar("SELECT SUM(amount) FROM app_energy WHERE app_id = ?")
                .bind(app_id)
                .fetch_one(&self.pool)
                .await?;
        let last24h: Option<f64> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM app_energy WHERE app_id = ? AND timestamp_millis >= ?",
        )
        .bind(app_id)
        .bind(cutoff_24h)
        .fetch_one(&self.pool)
        .await?;
        let last1h: Option<f64> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM app_energy WHERE app_id = ? AND timestamp_millis >= ?",
        )
        .bind(app_id)
        .bind(cutoff_1h)
        .fetch_one(&self.pool)
        .await?;
        let last1min: Option<f64> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM app_energy WHERE app_id = ? AND timestamp_millis >= ?",
        )
        .bind(app_id)
        .bind(cutoff_1min)
        .fetch_one(&self.pool)
        .await?;

        Ok(EnergyMetrics {
            total: total.unwrap_or(0.0),
            last24h: last24h.unwrap_or(0.0),
            last1h: last1h.unwrap_or(0.0),
            last1min: last1min.unwrap_or(0.0),
        })
    }

    pub async fn health(&self, app_id: &str) -> Result<AppHealth> {
        Ok(classify(&self.get_energy_metrics(app_id).await?))
    }

    pub async fn list_apps(&self) -> Result<Vec<AppSummary>> {
        let rows = self.rows.read().await;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows.values() {
            let metrics = self.get_energy_metrics(&row.config.app_id).await?;
            out.push(AppSummary {
                app_id: row.config.app_id.clone(),
                app_type: row.config.app_type,
                enabled: row.config.enabled,
                running: row.running,
                endpoint: row.config.endpoint.clone(),
                energy: metrics,
                health: classify(&metrics),
            });
        }
        Ok(out)
    }

    pub async fn is_installed(&self, app_id: &str) -> bool {
        self.rows.read().await.contains_key(app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn registry() -> AppRegistry {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let reg = AppRegistry::new(pool);
        reg.migrate().await.unwrap();
        reg
    }

    #[tokio::test]
    async fn install_then_uninstall_leaves_list_unchanged() {
        let reg = registry().await;
        let before = reg.list_apps().await.unwrap().len();

        reg.install(AppConfig {
            app_id: "chat".into(),
            app_type: AppType::InProcess,
            enabled: true,
            endpoint: None,
            hourly_energy_budget: None,
            daily_energy_budget: None,
        })
        .await
        .unwrap();
        reg.uninstall("chat").await.unwrap();

        let after = reg.list_apps().await.unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn http_app_without_endpoint_is_rejected() {
        let reg = registry().await;
        let err = reg
            .install(AppConfig {
                app_id: "remote".into(),
                app_type: AppType::Http,
                enabled: true,
                endpoint: None,
                hourly_energy_budget: None,
                daily_energy_budget: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SynapseError::MissingEndpoint));
    }

    #[tokio::test]
    async fn duplicate_install_is_rejected() {
        let reg = registry().await;
        let cfg = AppConfig {
            app_id: "chat".into(),
            app_type: AppType::InProcess,
            enabled: true,
            endpoint: None,
            hourly_energy_budget: None,
            daily_energy_budget: None,
        };
        reg.install(cfg.clone()).await.unwrap();
        let err = reg.install(cfg).await.unwrap_err();
        assert!(matches!(err, SynapseError::AlreadyInstalled(_)));
    }

    #[tokio::test]
    async fn routing_to_loop_is_forbidden() {
        let reg = registry().await;
        let err = reg
            .route_message(AppMessage {
                from: "chat".into(),
                to: "loop".into(),
                content: serde_json::json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SynapseError::RouteToLoopForbidden));
    }

    #[tokio::test]
    async fn associate_conversation_is_idempotent() {
        let reg = registry().await;
        reg.install(AppConfig {
            app_id: "chat".into(),
            app_type: AppType::InProcess,
            enabled: true,
            endpoint: None,
            hourly_energy_budget: None,
            daily_energy_budget: None,
        })
        .await
        .unwrap();

        reg.associate_conversation("c1", "chat").await.unwrap();
        reg.associate_conversation("c1", "chat").await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_conversations")
            .fetch_one(&reg.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
