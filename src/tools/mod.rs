// src/tools/mod.rs
// Unified tool surface (spec §4.E): core tools + namespaced MCP tools
// flattened into one catalog each cycle.

pub mod core_tools;
pub mod dispatch;

pub use dispatch::{resolve, CoreToolCall, DispatchTarget};

use serde::Serialize;
use serde_json::Value;

use crate::subagent::ExposedMcpTool;

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// The flat catalog presented to the LLM each cycle. Name uniqueness across
/// MCP tools is guaranteed by namespacing (`"{serverId}_{toolName}"`); core
/// tool names are reserved and never shadowed by an MCP tool with a
/// colliding exposed name (servers cannot literally be named like a core tool
/// prefix and collide, since namespacing always interposes `_`).
pub struct ToolCatalog {
    pub core: Vec<ToolDescriptor>,
    pub mcp: Vec<ExposedMcpTool>,
}

impl ToolCatalog {
    pub fn new(mcp: Vec<ExposedMcpTool>) -> Self {
        Self { core: core_tools::descriptors(), mcp }
    }

    pub fn all_descriptors(&self) -> Vec<ToolDescriptor> {
        let mut all = self.core.clone();
        all.extend(self.mcp.iter().map(|t| ToolDescriptor {
            name: t.exposed_name.clone(),
            description: t.description.clone(),
            input_schema: t.input_schema.clone(),
        }));
        all
    }
}
