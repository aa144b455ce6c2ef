// src/subagent/mod.rs
// The MCP sub-agent (spec §4.D): background server lifecycle management,
// decoupled from the main cognitive loop.

pub mod config_store;
pub mod protocol;
pub mod queue;
pub mod transport;
pub mod types;
pub mod worker;

pub use protocol::{ExposedMcpTool, McpConfigFile, McpServerConfig, McpToolDescriptor, McpTransportKind};
pub use types::{Priority, RequestStatus, SubAgentMessage, SubAgentOp, SubAgentRequestRecord};
pub use worker::McpSubAgent;
