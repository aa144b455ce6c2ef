// src/tools/core_tools.rs
// Core tool schemas, always present unless restricted (spec §4.E.1).

use serde_json::{json, Value};

use super::dispatch::{
    AwaitEnergyArgs, EndConversationArgs, McpAddServerArgs, RespondArgs, SelectConversationArgs,
    SnoozeConversationArgs, ThinkArgs,
};
use super::ToolDescriptor;

pub const RESPOND: &str = "respond";
pub const THINK: &str = "think";
pub const SELECT_CONVERSATION: &str = "select_conversation";
pub const AWAIT_ENERGY: &str = "await_energy";
pub const END_CONVERSATION: &str = "end_conversation";
pub const SNOOZE_CONVERSATION: &str = "snooze_conversation";
pub const MCP_ADD_SERVER: &str = "mcp_add_server";
pub const MCP_LIST_SERVERS: &str = "mcp_list_servers";

pub const CORE_TOOL_NAMES: &[&str] = &[
    RESPOND,
    THINK,
    SELECT_CONVERSATION,
    AWAIT_ENERGY,
    END_CONVERSATION,
    SNOOZE_CONVERSATION,
    MCP_ADD_SERVER,
    MCP_LIST_SERVERS,
];

pub fn is_core_tool(name: &str) -> bool {
    CORE_TOOL_NAMES.contains(&name)
}

fn schema_for<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
}

/// The catalog entries presented to the LLM every cycle (spec §4.E.1). Each
/// schema is derived straight from the struct `dispatch::resolve` decodes
/// into, so the catalog can never drift from what actually parses.
pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: RESPOND.to_string(),
            description: "Append an assistant response to a conversation.".to_string(),
            input_schema: schema_for::<RespondArgs>(),
        },
        ToolDescriptor {
            name: THINK.to_string(),
            description: "Record an internal note. Costs energy, produces no user-visible output.".to_string(),
            input_schema: schema_for::<ThinkArgs>(),
        },
        ToolDescriptor {
            name: SELECT_CONVERSATION.to_string(),
            description: "Make a conversation the focus of the next cycle.".to_string(),
            input_schema: schema_for::<SelectConversationArgs>(),
        },
        ToolDescriptor {
            name: AWAIT_ENERGY.to_string(),
            description: "Voluntarily sleep until energy reaches at least minLevel.".to_string(),
            input_schema: schema_for::<AwaitEnergyArgs>(),
        },
        ToolDescriptor {
            name: END_CONVERSATION.to_string(),
            description: "Terminally end a conversation with a reason.".to_string(),
            input_schema: schema_for::<EndConversationArgs>(),
        },
        ToolDescriptor {
            name: SNOOZE_CONVERSATION.to_string(),
            description: "Schedule a conversation to wake after a number of minutes.".to_string(),
            input_schema: schema_for::<SnoozeConversationArgs>(),
        },
        ToolDescriptor {
            name: MCP_ADD_SERVER.to_string(),
            description: "Enqueue a sub-agent request to install an MCP server.".to_string(),
            input_schema: schema_for::<McpAddServerArgs>(),
        },
        ToolDescriptor {
            name: MCP_LIST_SERVERS.to_string(),
            description: "Enqueue a sub-agent request to list installed MCP servers.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}
