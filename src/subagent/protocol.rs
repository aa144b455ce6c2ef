// src/subagent/protocol.rs
// MCP server/tool descriptors and the persisted config file shape
// (spec §3 `MCP Server Record`, `MCP Tool (exposed)`, §6 persistent layout).
//
// The JSON-RPC 2.0 wire protocol itself is explicitly out of scope (spec §1);
// these are just the data shapes the sub-agent persists and exposes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransportKind {
    Stdio,
    Http,
}

/// A registered MCP server (spec §3). `args` empty ⇒ mock mode (spec §4.D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub id: String,
    pub transport: McpTransportKind,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub auth: Option<String>,
    pub enabled: bool,
}

impl McpServerConfig {
    pub fn is_mock_mode(&self) -> bool {
        self.args.is_empty()
    }
}

/// A tool as discovered from a server, before namespacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A tool as exposed to the LLM (spec §3 `MCP Tool (exposed)`):
/// `exposedName = "{serverId}_{toolName}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposedMcpTool {
    pub exposed_name: String,
    pub original_name: String,
    pub server_id: String,
    pub description: String,
    pub input_schema: Value,
}

impl ExposedMcpTool {
    pub fn from_descriptor(server_id: &str, descriptor: &McpToolDescriptor) -> Self {
        Self {
            exposed_name: format!("{server_id}_{}", descriptor.name),
            original_name: descriptor.name.clone(),
            server_id: server_id.to_string(),
            description: format!("[MCP:{server_id}] {}", descriptor.description),
            input_schema: descriptor.input_schema.clone(),
        }
    }
}

/// The single JSON object persisted to disk (spec §6 `MCP servers file`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfigFile {
    pub servers: Vec<McpServerConfig>,
    #[serde(rename = "subAgentEnabled")]
    pub sub_agent_enabled: bool,
    #[serde(rename = "autoDiscoveryEnabled")]
    pub auto_discovery_enabled: bool,
    #[serde(rename = "toolApprovalRequired")]
    pub tool_approval_required: bool,
}

impl Default for McpConfigFile {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            sub_agent_enabled: true,
            auto_discovery_enabled: false,
            tool_approval_required: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub content: Value,
    #[serde(default)]
    pub is_error: bool,
}
