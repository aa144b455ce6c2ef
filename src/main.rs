//! synapse - the cognitive scheduler's process entry point.
//!
//! Wires the conversation store, app registry, energy regulator, MCP
//! sub-agent, and sensitive loop together, then runs until interrupted.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use synapse::apps::{AppRegistry, ChatApp};
use synapse::config::CONFIG;
use synapse::core::Core;
use synapse::energy::EnergyRegulator;
use synapse::events::EventBus;
use synapse::llm::MockLlmProvider;
use synapse::sensitive_loop::SensitiveLoop;
use synapse::stats::Stats;
use synapse::store::SqliteConversationStore;
use synapse::subagent::McpSubAgent;

#[derive(Parser)]
#[command(name = "synapse")]
#[command(about = "Cognitive scheduler that regulates LLM compute via a bounded energy reservoir")]
struct Args {
    /// Override the sqlite database URL (defaults to config/env `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Run the loop without a real LLM backend wired up, using a deterministic
    /// mock provider instead. Useful for local smoke-testing.
    #[arg(long)]
    mock_llm: bool,

    /// Run a fixed number of cognitive cycles then exit, instead of running
    /// until interrupted.
    #[arg(long)]
    cycles: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    CONFIG.validate()?;

    info!("starting synapse cognitive scheduler");

    let database_url = args.database_url.unwrap_or_else(|| CONFIG.database.url.clone());
    let connect_options: SqliteConnectOptions = database_url.parse::<SqliteConnectOptions>()?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(CONFIG.database.max_connections)
        .connect_with(connect_options)
        .await?;
    info!("connected to {}", database_url);

    let store = Arc::new(SqliteConversationStore::new(pool.clone()));
    store.migrate().await?;

    let apps = Arc::new(AppRegistry::new(pool.clone()));
    apps.migrate().await?;

    let regulator = Arc::new(EnergyRegulator::from_config(&CONFIG.energy));
    let subagent = Arc::new(McpSubAgent::new(CONFIG.mcp_file.config_path.clone(), CONFIG.subagent.clone()));
    let events = Arc::new(EventBus::new());
    let stats = Arc::new(Stats::new());

    let chat_app_cfg = synapse::apps::AppConfig {
        app_id: synapse::apps::CHAT_APP_ID.to_string(),
        app_type: synapse::apps::AppType::InProcess,
        enabled: true,
        endpoint: None,
        hourly_energy_budget: None,
        daily_energy_budget: None,
    };
    match apps.install(chat_app_cfg).await {
        Ok(()) | Err(synapse::SynapseError::AlreadyInstalled(_)) => {}
        Err(e) => return Err(e.into()),
    }
    apps.register_app(Arc::new(ChatApp::new(store.clone()))).await?;

    let llm: Arc<dyn synapse::llm::LlmProvider> = if args.mock_llm {
        info!("using mock LLM provider (--mock-llm)");
        Arc::new(MockLlmProvider::new())
    } else {
        info!("no real LLM backend is wired up in this build; falling back to the mock provider");
        Arc::new(MockLlmProvider::new())
    };

    let sensitive_loop = Arc::new(SensitiveLoop::new(
        store.clone(),
        apps.clone(),
        regulator.clone(),
        subagent.clone(),
        llm,
        events.clone(),
        stats.clone(),
        CONFIG.energy.clone(),
        CONFIG.model.clone(),
        CONFIG.loop_config.clone(),
    ));

    let _core = Core::new(store, apps, regulator, subagent.clone(), events, stats, sensitive_loop.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let subagent_handle = {
        let subagent = subagent.clone();
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { subagent.run(rx).await })
    };

    if let Some(cycles) = args.cycles {
        for _ in 0..cycles {
            sensitive_loop.run_cycle().await;
        }
        shutdown_tx.send(true).ok();
    } else {
        let loop_handle = {
            let sensitive_loop = sensitive_loop.clone();
            let rx = shutdown_rx.clone();
            tokio::spawn(async move { sensitive_loop.run(rx).await })
        };

        tokio::signal::ctrl_c().await?;
        info!("received shutdown signal");
        shutdown_tx.send(true).ok();
        let _ = loop_handle.await;
    }

    let _ = subagent_handle.await;
    info!("synapse shut down cleanly");
    Ok(())
}
