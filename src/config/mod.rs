// src/config/mod.rs
// Central configuration for the cognitive core, composed from domain configs
// the way the teacher's `config/mod.rs` does.

pub mod energy;
pub mod helpers;
pub mod loop_config;
pub mod model;

pub use energy::EnergyConfig;
pub use loop_config::{LoopConfig, SubAgentConfig};
pub use model::ModelConfig;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use helpers::{env_or, env_u64};

pub static CONFIG: Lazy<SynapseConfig> = Lazy::new(SynapseConfig::from_env);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: env_or("DATABASE_URL", "sqlite://synapse.db"),
            max_connections: env_u64("SYNAPSE_SQLITE_MAX_CONNECTIONS", 5) as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpFileConfig {
    /// Path to the persisted MCP servers config file (spec §3, §4.D).
    pub config_path: std::path::PathBuf,
}

impl McpFileConfig {
    pub fn from_env() -> Self {
        let path = std::env::var("SYNAPSE_MCP_CONFIG_PATH")
            .map(std::path::PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| std::path::PathBuf::from("."))
                    .join(".synapse")
                    .join("mcp.json")
            });
        Self { config_path: path }
    }
}

/// Top-level configuration, composing all domain configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynapseConfig {
    pub energy: EnergyConfig,
    pub model: ModelConfig,
    pub loop_config: LoopConfig,
    pub subagent: SubAgentConfig,
    pub database: DatabaseConfig,
    pub mcp_file: McpFileConfig,
    pub log_level: String,
}

impl SynapseConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            energy: EnergyConfig::from_env(),
            model: ModelConfig::from_env(),
            loop_config: LoopConfig::from_env(),
            subagent: SubAgentConfig::from_env(),
            database: DatabaseConfig::from_env(),
            mcp_file: McpFileConfig::from_env(),
            log_level: env_or("SYNAPSE_LOG_LEVEL", "info"),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.energy.validate()?;
        Ok(())
    }
}

impl Default for SynapseConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
