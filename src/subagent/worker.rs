// src/subagent/worker.rs
// The MCP sub-agent: a single cooperative background worker that performs
// server lifecycle operations off the main loop (spec §4.D).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::SubAgentConfig;
use crate::error::{Result, SynapseError};

use super::config_store::McpConfigStore;
use super::protocol::{ExposedMcpTool, McpServerConfig, McpTransportKind};
use super::queue::RequestQueue;
use super::transport::{McpTransport, MockTransport, StdioTransport};
use super::types::{Priority, RequestStatus, SubAgentMessage, SubAgentOp, SubAgentRequest, SubAgentRequestRecord};

const ENERGY_SCALE: f64 = 1000.0;

pub struct McpSubAgent {
    queue: RequestQueue,
    mailbox: Mutex<VecDeque<SubAgentMessage>>,
    records: RwLock<HashMap<String, SubAgentRequestRecord>>,
    energy_millis_since_poll: AtomicI64,
    config_store: McpConfigStore,
    cfg: SubAgentConfig,
    cancel: CancellationToken,
}

impl McpSubAgent {
    pub fn new(config_path: std::path::PathBuf, cfg: SubAgentConfig) -> Self {
        Self {
            queue: RequestQueue::new(),
            mailbox: Mutex::new(VecDeque::new()),
            records: RwLock::new(HashMap::new()),
            energy_millis_since_poll: AtomicI64::new(0),
            config_store: McpConfigStore::new(config_path),
            cfg,
            cancel: CancellationToken::new(),
        }
    }

    /// Enqueues a sub-agent request and returns its id synchronously (spec
    /// §4.F step 6: "enqueue ... return request id synchronously").
    pub async fn submit(&self, op: SubAgentOp, params: Value, priority: Priority) -> String {
        let id = Uuid::new_v4().to_string();
        self.records
            .write()
            .await
            .insert(id.clone(), SubAgentRequestRecord::queued(&id));

        self.queue
            .push(SubAgentRequest { id: id.clone(), op, params, priority, queued_at: chrono::Utc::now() })
            .await;

        id
    }

    pub async fn status(&self, id: &str) -> Option<SubAgentRequestRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Legal only while `queued` (spec §4.D).
    pub async fn cancel(&self, id: &str) -> Result<()> {
        if !self.queue.cancel_if_queued(id).await {
            return Err(SynapseError::RequestNotFound(id.to_string()));
        }
        if let Some(record) = self.records.write().await.get_mut(id) {
            record.status = RequestStatus::Cancelled;
            record.message = "cancelled while queued".to_string();
        }
        Ok(())
    }

    /// Drains the pull-only mailbox; never blocks (spec §4.D).
    pub async fn poll_messages(&self) -> Vec<SubAgentMessage> {
        let mut mailbox = self.mailbox.lock().await;
        mailbox.drain(..).collect()
    }

    /// Reads and resets the monotone energy counter. Idempotent within a
    /// single call and reset to 0 immediately after (spec §8 invariant 7).
    pub fn energy_consumed_since_last_poll(&self) -> f64 {
        self.energy_millis_since_poll.swap(0, Ordering::SeqCst) as f64 / ENERGY_SCALE
    }

    pub async fn queue_depth(&self) -> usize {
        self.queue.len().await
    }

    /// Queries every enabled server's tool catalog concurrently; one slow or
    /// unreachable server never head-of-line-blocks the rest.
    pub async fn list_exposed_tools(&self) -> Vec<ExposedMcpTool> {
        let config = match self.config_store.load().await {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let queries = config.servers.iter().filter(|s| s.enabled).map(|server| async move {
            let mut transport = make_transport(server);
            if transport.initialize().await.is_err() {
                return Vec::new();
            }
            match transport.list_tools().await {
                Ok(tools) => tools.iter().map(|t| ExposedMcpTool::from_descriptor(&server.id, t)).collect(),
                Err(_) => Vec::new(),
            }
        });

        join_all(queries).await.into_iter().flatten().collect()
    }

    /// Dispatches an already-namespaced MCP domain tool call to its server.
    pub async fn call_tool(&self, server_id: &str, original_name: &str, arguments: Value) -> Result<Value> {
        let config = self.config_store.load().await?;
        let server = config
            .servers
            .iter()
            .find(|s| s.id == server_id)
            .ok_or_else(|| SynapseError::BadRequest(format!("unknown mcp server '{server_id}'")))?;

        let mut transport = make_transport(server);
        transport.initialize().await?;
        let result = transport.call_tool(original_name, arguments).await?;
        Ok(result.content)
    }

    /// Runs until `shutdown` is notified; one request in flight at a time.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("[subagent] shutting down");
                        self.cancel.cancel();
                        return;
                    }
                }
                request = self.pop_request() => {
                    let Some(request) = request else {
                        sleep(Duration::from_millis(50)).await;
                        continue;
                    };
                    self.process(request).await;
                }
            }
        }
    }

    async fn pop_request(&self) -> Option<SubAgentRequest> {
        self.queue.pop().await
    }

    async fn process(&self, request: SubAgentRequest) {
        let id = request.id.clone();
        self.set_status(&id, RequestStatus::InProgress, 10, "processing").await;
        self.push_message(SubAgentMessage::StatusUpdate {
            request_id: id.clone(),
            progress: 10,
            message: "processing".to_string(),
        })
        .await;

        let started = Instant::now();
        let mut attempt = 0u32;
        let outcome = loop {
            match self.run_operation(&request).await {
                Ok(value) => break Ok(value),
                Err(e) if attempt < self.cfg.max_retries && e.is_transient() => {
                    attempt += 1;
                    let base_delay_ms = (self.cfg.backoff_base_ms * 2u64.pow(attempt)).min(self.cfg.backoff_cap_ms);
                    let jitter_ms = rand::rng().random_range(0..=base_delay_ms / 2 + 1);
                    let delay_ms = base_delay_ms + jitter_ms;
                    warn!(
                        "[subagent] request {} attempt {} failed transiently: {}; retrying in {}ms",
                        id, attempt, e, delay_ms
                    );
                    tokio::select! {
                        _ = sleep(Duration::from_millis(delay_ms)) => {}
                        _ = self.cancel.cancelled() => break Err(e),
                    }
                }
                Err(e) => break Err(e),
            }
        };

        let elapsed_s = started.elapsed().as_secs_f64();
        self.accrue_energy(elapsed_s);

        match outcome {
            Ok(result) => {
                self.set_status(&id, RequestStatus::Completed, 100, "completed").await;
                if let Some(record) = self.records.write().await.get_mut(&id) {
                    record.result = Some(result.clone());
                }
                self.push_message(SubAgentMessage::Completion { request_id: id, result }).await;
            }
            Err(e) => {
                error!("[subagent] request {} failed: {}", id, e);
                self.set_status(&id, RequestStatus::Failed, 100, "failed").await;
                if let Some(record) = self.records.write().await.get_mut(&id) {
                    record.error = Some(e.to_string());
                }
                self.push_message(SubAgentMessage::Error { request_id: id, error: e.to_string() }).await;
            }
        }
    }

    async fn run_operation(&self, request: &SubAgentRequest) -> Result<Value> {
        match request.op {
            SubAgentOp::AddServer => self.op_add_server(&request.params).await,
            SubAgentOp::RemoveServer => self.op_remove_server(&request.params).await,
            SubAgentOp::TestServer => self.op_test_server(&request.params).await,
            SubAgentOp::ListServers => self.op_list_servers().await,
            SubAgentOp::SearchServers => self.op_search_servers(&request.params).await,
            SubAgentOp::ModifyServer => self.op_modify_server(&request.params).await,
        }
    }

    async fn op_add_server(&self, params: &Value) -> Result<Value> {
        let server: McpServerConfig =
            serde_json::from_value(params.clone()).map_err(|e| SynapseError::BadRequest(e.to_string()))?;

        let mut transport = make_transport(&server);
        transport.initialize().await?;
        let tools = transport.list_tools().await?;

        let mut config = self.config_store.load().await?;
        config.servers.retain(|s| s.id != server.id);
        config.servers.push(server.clone());
        self.config_store.save(&config).await?;

        Ok(json!({"serverId": server.id, "tools": tools}))
    }

    async fn op_remove_server(&self, params: &Value) -> Result<Value> {
        let id = params
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SynapseError::BadRequest("remove_server requires 'id'".to_string()))?;

        let mut config = self.config_store.load().await?;
        let before = config.servers.len();
        config.servers.retain(|s| s.id != id);
        self.config_store.save(&config).await?;

        Ok(json!({"removed": before != config.servers.len()}))
    }

    /// Performs initialize + `tools/list` round-trips without persisting
    /// (spec §4.D).
    async fn op_test_server(&self, params: &Value) -> Result<Value> {
        let server: McpServerConfig =
            serde_json::from_value(params.clone()).map_err(|e| SynapseError::BadRequest(e.to_string()))?;
        let mut transport = make_transport(&server);
        transport.initialize().await?;
        let tools = transport.list_tools().await?;
        Ok(json!({"serverId": server.id, "tools": tools}))
    }

    async fn op_list_servers(&self) -> Result<Value> {
        let config = self.config_store.load().await?;
        serde_json::to_value(config.servers).map_err(|e| SynapseError::Internal(e.into()))
    }

    async fn op_search_servers(&self, params: &Value) -> Result<Value> {
        let query = params.get("query").and_then(Value::as_str).unwrap_or("").to_lowercase();
        let config = self.config_store.load().await?;
        let matches: Vec<_> = config
            .servers
            .into_iter()
            .filter(|s| s.id.to_lowercase().contains(&query))
            .collect();
        serde_json::to_value(matches).map_err(|e| SynapseError::Internal(e.into()))
    }

    async fn op_modify_server(&self, params: &Value) -> Result<Value> {
        let id = params
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SynapseError::BadRequest("modify_server requires 'id'".to_string()))?;

        let mut config = self.config_store.load().await?;
        let server = config
            .servers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| SynapseError::BadRequest(format!("unknown server '{id}'")))?;

        if let Some(enabled) = params.get("enabled").and_then(Value::as_bool) {
            server.enabled = enabled;
        }
        if let Some(args) = params.get("args").and_then(Value::as_array) {
            server.args = args.iter().filter_map(|v| v.as_str().map(String::from)).collect();
        }
        if let Some(command) = params.get("command").and_then(Value::as_str) {
            server.command = Some(command.to_string());
        }

        let updated = server.clone();
        self.config_store.save(&config).await?;
        serde_json::to_value(updated).map_err(|e| SynapseError::Internal(e.into()))
    }

    async fn set_status(&self, id: &str, status: RequestStatus, progress: u8, message: &str) {
        if let Some(record) = self.records.write().await.get_mut(id) {
            record.status = status;
            record.progress = progress;
            record.message = message.to_string();
        }
    }

    async fn push_message(&self, message: SubAgentMessage) {
        self.mailbox.lock().await.push_back(message);
    }

    fn accrue_energy(&self, processing_seconds: f64) {
        let delta = processing_seconds * self.cfg.k_energy_per_second;
        let delta_millis = (delta * ENERGY_SCALE).round() as i64;
        self.energy_millis_since_poll.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

fn make_transport(server: &McpServerConfig) -> Box<dyn McpTransport> {
    if server.is_mock_mode() {
        Box::new(MockTransport::new(&server.id))
    } else {
        match server.transport {
            McpTransportKind::Stdio => match StdioTransport::spawn(server) {
                Ok(t) => Box::new(t),
                Err(_) => Box::new(MockTransport::new(&server.id)),
            },
            McpTransportKind::Http => Box::new(MockTransport::new(&server.id)),
        }
    }
}
