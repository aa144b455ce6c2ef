// src/subagent/config_store.rs
// Atomic load/save of the MCP servers config file (spec §4.D, §6):
// `add_server`/`remove_server` mutate it via write-temp-rename.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::{Result, SynapseError};

use super::protocol::McpConfigFile;

pub struct McpConfigStore {
    path: PathBuf,
}

impl McpConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn load(&self) -> Result<McpConfigFile> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| SynapseError::Internal(e.into()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(McpConfigFile::default()),
            Err(e) => Err(SynapseError::Internal(e.into())),
        }
    }

    /// Write-temp-rename: never leaves a partially-written config file on
    /// disk even if the process dies mid-write.
    pub async fn save(&self, config: &McpConfigFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SynapseError::Internal(e.into()))?;
        }

        let tmp_path = tmp_path_for(&self.path);
        let bytes = serde_json::to_vec_pretty(config).map_err(|e| SynapseError::Internal(e.into()))?;
        fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| SynapseError::Internal(e.into()))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| SynapseError::Internal(e.into()))?;

        debug!("[subagent] mcp config persisted to {:?}", self.path);
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subagent::protocol::{McpServerConfig, McpTransportKind};

    #[tokio::test]
    async fn roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = McpConfigStore::new(dir.path().join("mcp.json"));

        let loaded = store.load().await.unwrap();
        assert!(loaded.servers.is_empty());

        let mut config = McpConfigFile::default();
        config.servers.push(McpServerConfig {
            id: "fs-local".into(),
            transport: McpTransportKind::Stdio,
            command: Some("echo".into()),
            args: vec![],
            url: None,
            auth: None,
            enabled: true,
        });
        store.save(&config).await.unwrap();

        let reloaded = store.load().await.unwrap();
        assert_eq!(reloaded.servers.len(), 1);
        assert_eq!(reloaded.servers[0].id, "fs-local");
    }
}
