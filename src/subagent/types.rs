// src/subagent/types.rs
// Sub-agent request/status/message types (spec §3 `Sub-Agent Request`, §4.D).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
        )
    }
}

/// The sub-agent meta-operations (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentOp {
    AddServer,
    RemoveServer,
    TestServer,
    ListServers,
    SearchServers,
    ModifyServer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentRequest {
    pub id: String,
    pub op: SubAgentOp,
    pub params: Value,
    pub priority: Priority,
    pub queued_at: DateTime<Utc>,
}

/// Mutable status record tracked for every request id, returned by a status
/// lookup and used to build `SubAgentMessage`s as it transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentRequestRecord {
    pub id: String,
    pub status: RequestStatus,
    pub progress: u8,
    pub message: String,
    pub energy_consumed: f64,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl SubAgentRequestRecord {
    pub fn queued(id: &str) -> Self {
        Self {
            id: id.to_string(),
            status: RequestStatus::Queued,
            progress: 0,
            message: "queued".to_string(),
            energy_consumed: 0.0,
            result: None,
            error: None,
        }
    }
}

/// Pull-mailbox message (spec §4.D): `status_update`, `completion`, `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubAgentMessage {
    StatusUpdate { request_id: String, progress: u8, message: String },
    Completion { request_id: String, result: Value },
    Error { request_id: String, error: String },
}

impl SubAgentMessage {
    pub fn request_id(&self) -> &str {
        match self {
            SubAgentMessage::StatusUpdate { request_id, .. }
            | SubAgentMessage::Completion { request_id, .. }
            | SubAgentMessage::Error { request_id, .. } => request_id,
        }
    }
}
