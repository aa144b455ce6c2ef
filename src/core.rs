// src/core.rs
// The cognitive core's external-interface handle (spec §6 "Inbound
// operations the core exposes to the edge"). Transport-agnostic: an HTTP or
// WebSocket edge (out of scope, spec §1) calls straight through this.
//
// Grounded on the teacher's `AppState` (examples/ConaryLabs-Mira/backend/src/state.rs):
// a handle composed of `Arc<...>` services, constructed once and cloned cheaply.

use std::sync::Arc;

use uuid::Uuid;

use crate::apps::{AppConfig, AppRegistry, AppSummary, EnergyMetrics, CHAT_APP_ID};
use crate::energy::EnergySnapshot;
use crate::error::{Result, SynapseError};
use crate::events::EventBus;
use crate::sensitive_loop::SensitiveLoop;
use crate::stats::{Stats, StatsSnapshot};
use crate::store::{
    BudgetSnapshot, BudgetStatus, Conversation, ConversationState, ConversationStore, ConversationSummary, ListFilter,
};
use crate::subagent::McpSubAgent;

/// Validated arguments to `listConversations` (spec §6).
#[derive(Debug, Clone, Default)]
pub struct ListConversationsArgs {
    pub limit: Option<i64>,
    pub state: Option<String>,
    pub budget_status: Option<String>,
}

impl ListConversationsArgs {
    fn validated(self) -> Result<ListFilter> {
        let state = match self.state {
            None => None,
            Some(s) => Some(
                ConversationState::from_str(&s)
                    .ok_or_else(|| SynapseError::BadRequest(format!("unknown state '{s}'")))?,
            ),
        };
        let budget_status = match self.budget_status {
            None => None,
            Some(s) => Some(parse_budget_status(&s)?),
        };
        Ok(ListFilter { limit: ListFilter::clamp_limit(self.limit), state, budget_status })
    }
}

fn parse_budget_status(s: &str) -> Result<BudgetStatus> {
    match s {
        "within" => Ok(BudgetStatus::Within),
        "exceeded" => Ok(BudgetStatus::Exceeded),
        "depleted" => Ok(BudgetStatus::Depleted),
        other => Err(SynapseError::BadRequest(format!("unknown budgetStatus '{other}'"))),
    }
}

pub struct Core {
    store: Arc<dyn ConversationStore>,
    apps: Arc<AppRegistry>,
    regulator: Arc<crate::energy::EnergyRegulator>,
    subagent: Arc<McpSubAgent>,
    events: Arc<EventBus>,
    stats: Arc<Stats>,
    sensitive_loop: Arc<SensitiveLoop>,
}

impl Core {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        apps: Arc<AppRegistry>,
        regulator: Arc<crate::energy::EnergyRegulator>,
        subagent: Arc<McpSubAgent>,
        events: Arc<EventBus>,
        stats: Arc<Stats>,
        sensitive_loop: Arc<SensitiveLoop>,
    ) -> Self {
        Self { store, apps, regulator, subagent, events, stats, sensitive_loop }
    }

    /// Assigns or validates `requestId` (must be unique); creates a
    /// conversation bound to `appId` (spec §6).
    pub async fn submit_user_message(
        &self,
        app_id: &str,
        request_id: Option<String>,
        content: String,
        energy_budget: Option<f64>,
    ) -> Result<String> {
        if !self.apps.is_installed(app_id).await {
            return Err(SynapseError::UnknownApp(app_id.to_string()));
        }
        if let Some(b) = energy_budget {
            if b < 0.0 {
                return Err(SynapseError::InvalidBudget(b));
            }
        }

        let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.store.get_conversation(&request_id).await?.is_some() {
            return Err(SynapseError::DuplicateId(request_id));
        }

        self.store
            .add_response(crate::store::AddResponseRequest {
                request_id: request_id.clone(),
                user_message: Some(content.clone()),
                budget: energy_budget,
                app_id: Some(app_id.to_string()),
                energy_level: self.regulator.level(),
                ..Default::default()
            })
            .await?;
        self.apps.associate_conversation(&request_id, app_id).await?;

        self.events.publish(crate::events::Event::ConversationCreated {
            request_id: request_id.clone(),
            app_id: Some(app_id.to_string()),
        });
        self.events.publish(crate::events::Event::MessageAdded {
            request_id: request_id.clone(),
            role: "user".to_string(),
            content,
            energy_level: self.regulator.level(),
            model_used: None,
        });

        Ok(request_id)
    }

    pub async fn get_conversation(&self, request_id: &str) -> Result<Option<Conversation>> {
        self.store.get_conversation(request_id).await
    }

    pub async fn list_conversations(&self, args: ListConversationsArgs) -> Result<Vec<ConversationSummary>> {
        self.store.list_conversations(args.validated()?).await
    }

    /// Composite budget read alongside `getConversation` (spec §6).
    pub async fn get_budget_snapshot(&self, request_id: &str) -> Result<Option<BudgetSnapshot>> {
        Ok(self.store.get_conversation(request_id).await?.map(|c| c.budget_snapshot()))
    }

    pub fn get_energy(&self) -> EnergySnapshot {
        self.regulator.snapshot()
    }

    pub async fn get_stats(&self) -> Result<StatsSnapshot> {
        Ok(StatsSnapshot {
            total_conversations: self.store.count_conversations().await?,
            total_responses: self.store.count_responses().await?,
            avg_energy_level: self.store.avg_energy_level().await?,
            current_energy: self.regulator.level(),
            uptime_seconds: self.stats.uptime_seconds(),
            model_switches: self.stats.model_switches(),
            sleep_cycles: self.stats.sleep_cycles(),
        })
    }

    /// Installs the app and, for `http` apps, binds the built-in webhook
    /// adapter (spec §3 `type ∈ {in-process, mcp, http}`) so `respond` can
    /// reach it without a separate registration step. `mcp`/`in-process`
    /// apps other than the built-in chat app register their own instance via
    /// a future edge, out of scope here.
    pub async fn install_app(&self, config: AppConfig) -> Result<()> {
        let app_id = config.app_id.clone();
        let http_endpoint = match config.app_type {
            crate::apps::AppType::Http => config.endpoint.clone(),
            _ => None,
        };
        self.apps.install(config).await?;
        if let Some(endpoint) = http_endpoint {
            self.apps.register_app(Arc::new(crate::apps::HttpApp::new(app_id, endpoint))).await?;
        }
        Ok(())
    }

    pub async fn uninstall_app(&self, app_id: &str) -> Result<()> {
        self.apps.uninstall(app_id).await
    }

    pub async fn list_apps(&self) -> Result<Vec<AppSummary>> {
        self.apps.list_apps().await
    }

    pub async fn get_app_energy(&self, app_id: &str) -> Result<EnergyMetrics> {
        self.apps.get_energy_metrics(app_id).await
    }

    /// Admin hook (spec §6): runs one cognitive cycle on demand, honoring
    /// the loop's regular priority ordering.
    pub async fn trigger_reflection(&self) {
        self.sensitive_loop.run_cycle().await;
    }

    /// Admin hook (spec §6): forces the next cycle to focus `requestId`.
    pub async fn process_conversation(&self, request_id: &str) -> Result<()> {
        if self.store.get_conversation(request_id).await?.is_none() {
            return Err(SynapseError::ConversationNotFound(request_id.to_string()));
        }
        self.sensitive_loop.force_focus(request_id.to_string()).await;
        self.sensitive_loop.run_cycle().await;
        Ok(())
    }

    pub fn default_app_id(&self) -> &'static str {
        CHAT_APP_ID
    }

    /// Debug/admin surface over the sub-agent's namespaced tool catalog.
    pub async fn list_mcp_tools(&self) -> Vec<crate::subagent::ExposedMcpTool> {
        self.subagent.list_exposed_tools().await
    }

    pub async fn get_subagent_request(&self, id: &str) -> Option<crate::subagent::SubAgentRequestRecord> {
        self.subagent.status(id).await
    }
}
