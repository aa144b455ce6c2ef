// src/subagent/transport.rs
// MCP transport negotiation (spec §4.D "real mode"), plus the mock transport
// used when a server's spawn `args` is empty.
//
// Grounded on the teacher's `McpTransport`/`StdioTransport` pair
// (examples/ConaryLabs-Mira/backend/src/mcp/transport.rs): a trait object
// behind `async_trait`, a child process talking newline-delimited JSON-RPC
// over stdio with `kill_on_drop(true)`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Result, SynapseError};

use super::protocol::{McpServerConfig, McpToolDescriptor, ToolCallResult};

#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn initialize(&mut self) -> Result<()>;
    async fn list_tools(&mut self) -> Result<Vec<McpToolDescriptor>>;
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolCallResult>;
}

/// Spawns the server's command as a child process and speaks
/// newline-delimited JSON-RPC 2.0 over its stdio. The wire protocol itself
/// is out of scope (spec §1); this transport only needs to shuttle bytes.
pub struct StdioTransport {
    child: Child,
    next_id: u64,
}

impl StdioTransport {
    pub fn spawn(config: &McpServerConfig) -> Result<Self> {
        let command = config
            .command
            .as_deref()
            .ok_or_else(|| SynapseError::BadRequest(format!("server '{}' has no command", config.id)))?;

        let child = Command::new(command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SynapseError::Transient(format!("spawn '{}' failed: {e}", config.id)))?;

        Ok(Self { child, next_id: 1 })
    }

    async fn roundtrip(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        let mut line = serde_json::to_vec(&request).map_err(|e| SynapseError::Internal(e.into()))?;
        line.push(b'\n');

        let stdin = self
            .child
            .stdin
            .as_mut()
            .ok_or_else(|| SynapseError::Transient("child stdin unavailable".to_string()))?;
        stdin
            .write_all(&line)
            .await
            .map_err(|e| SynapseError::Transient(e.to_string()))?;

        let stdout = self
            .child
            .stdout
            .as_mut()
            .ok_or_else(|| SynapseError::Transient("child stdout unavailable".to_string()))?;
        let mut reader = BufReader::new(stdout);
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .await
            .map_err(|e| SynapseError::Transient(e.to_string()))?;

        let response: Value = serde_json::from_str(response_line.trim())
            .map_err(|e| SynapseError::Transient(format!("malformed mcp response: {e}")))?;

        if let Some(error) = response.get("error") {
            return Err(SynapseError::Transient(format!("mcp error: {error}")));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn initialize(&mut self) -> Result<()> {
        self.roundtrip("initialize", json!({"protocolVersion": "2024-11-05"}))
            .await?;
        Ok(())
    }

    async fn list_tools(&mut self) -> Result<Vec<McpToolDescriptor>> {
        let result = self.roundtrip("tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .cloned()
            .unwrap_or_else(|| Value::Array(vec![]));
        serde_json::from_value(tools).map_err(|e| SynapseError::Internal(e.into()))
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let result = self
            .roundtrip("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        Ok(ToolCallResult { content: result, is_error: false })
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Err(e) = self.child.start_kill() {
            warn!("[subagent] failed to kill child transport: {}", e);
        }
    }
}

/// Used when a server's spawn `args` is empty (spec §4.D "mock mode"):
/// simulated delay and a fixed tool list, no real process or network I/O.
pub struct MockTransport {
    server_id: String,
}

impl MockTransport {
    pub fn new(server_id: &str) -> Self {
        Self { server_id: server_id.to_string() }
    }
}

#[async_trait]
impl McpTransport for MockTransport {
    async fn initialize(&mut self) -> Result<()> {
        sleep(Duration::from_millis(20)).await;
        Ok(())
    }

    async fn list_tools(&mut self) -> Result<Vec<McpToolDescriptor>> {
        sleep(Duration::from_millis(20)).await;
        Ok(vec![McpToolDescriptor {
            name: "read_file".to_string(),
            description: format!("Read a file (mock server '{}')", self.server_id),
            input_schema: json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
        }])
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        sleep(Duration::from_millis(30)).await;
        Ok(ToolCallResult {
            content: json!({"tool": name, "echo": arguments, "mock": true}),
            is_error: false,
        })
    }
}
