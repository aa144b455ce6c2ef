// tests/common/mod.rs
// Shared scaffolding for the end-to-end seed scenarios (spec §8).

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use synapse::apps::{AppConfig, AppRegistry, AppType, ChatApp, CHAT_APP_ID};
use synapse::config::{EnergyConfig, LoopConfig, ModelConfig, SubAgentConfig};
use synapse::core::Core;
use synapse::energy::EnergyRegulator;
use synapse::events::EventBus;
use synapse::llm::LlmProvider;
use synapse::sensitive_loop::SensitiveLoop;
use synapse::stats::Stats;
use synapse::store::{ConversationStore, SqliteConversationStore};
use synapse::subagent::McpSubAgent;

/// A fully wired instance, backed by an in-memory database and a temp MCP
/// config file, ready to run cognitive cycles against.
pub struct Harness {
    pub store: Arc<dyn ConversationStore>,
    pub apps: Arc<AppRegistry>,
    pub regulator: Arc<EnergyRegulator>,
    pub subagent: Arc<McpSubAgent>,
    pub events: Arc<EventBus>,
    pub stats: Arc<Stats>,
    _mcp_dir: tempfile::TempDir,
}

impl Harness {
    pub async fn new(energy_cfg: &EnergyConfig) -> Self {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();

        let store = Arc::new(SqliteConversationStore::new(pool.clone()));
        store.migrate().await.unwrap();

        let apps = Arc::new(AppRegistry::new(pool.clone()));
        apps.migrate().await.unwrap();
        apps.install(AppConfig {
            app_id: CHAT_APP_ID.to_string(),
            app_type: AppType::InProcess,
            enabled: true,
            endpoint: None,
            hourly_energy_budget: None,
            daily_energy_budget: None,
        })
        .await
        .unwrap();
        apps.register_app(Arc::new(ChatApp::new(store.clone()))).await.unwrap();

        let regulator = Arc::new(EnergyRegulator::from_config(energy_cfg));

        let mcp_dir = tempfile::tempdir().unwrap();
        let subagent = Arc::new(McpSubAgent::new(
            mcp_dir.path().join("mcp.json"),
            SubAgentConfig { k_energy_per_second: 2.0, max_retries: 2, backoff_base_ms: 1, backoff_cap_ms: 10 },
        ));

        Self {
            store,
            apps,
            regulator,
            subagent,
            events: Arc::new(EventBus::new()),
            stats: Arc::new(Stats::new()),
            _mcp_dir: mcp_dir,
        }
    }

    pub fn build_loop(
        &self,
        llm: Arc<dyn LlmProvider>,
        energy_cfg: EnergyConfig,
        model_cfg: ModelConfig,
        loop_cfg: LoopConfig,
    ) -> Arc<SensitiveLoop> {
        Arc::new(SensitiveLoop::new(
            self.store.clone(),
            self.apps.clone(),
            self.regulator.clone(),
            self.subagent.clone(),
            llm,
            self.events.clone(),
            self.stats.clone(),
            energy_cfg,
            model_cfg,
            loop_cfg,
        ))
    }

    pub fn core(&self, sensitive_loop: Arc<SensitiveLoop>) -> Core {
        Core::new(
            self.store.clone(),
            self.apps.clone(),
            self.regulator.clone(),
            self.subagent.clone(),
            self.events.clone(),
            self.stats.clone(),
            sensitive_loop,
        )
    }
}

pub fn default_energy_cfg() -> EnergyConfig {
    EnergyConfig {
        e_min: -50.0,
        e_max: 100.0,
        replenish_rate: 10.0,
        sleep_min_s: 1,
        sleep_max_s: 2,
        low_threshold: 20.0,
        high_threshold: 50.0,
    }
}

pub fn default_model_cfg() -> ModelConfig {
    let mut energy_per_second = std::collections::HashMap::new();
    energy_per_second.insert("large".to_string(), 15.0);
    energy_per_second.insert("small".to_string(), 5.0);
    ModelConfig {
        large_model: "large".to_string(),
        small_model: "small".to_string(),
        energy_per_second,
        tool_energy_per_second: 3.0,
    }
}

pub fn default_loop_cfg() -> LoopConfig {
    LoopConfig { history_per_cycle: 10, context_window: 10, duration_s: None }
}
