// src/tools/dispatch.rs
// Tool-call resolution (spec §4.E dispatch): core tools checked first, then
// the MCP catalog recovers `(serverId, originalName)`. Argument decoding
// failures are returned as a message string, not propagated as an error —
// the caller turns that into a synthetic tool-result for the LLM's next turn.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::core_tools;
use super::ExposedMcpTool;

/// Each core tool's argument struct derives `JsonSchema` so the catalog
/// descriptor handed to the LLM (`core_tools::descriptors`) is generated from
/// the same type that decodes the call, instead of a hand-maintained copy.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RespondArgs {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ThinkArgs {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SelectConversationArgs {
    #[serde(rename = "requestId")]
    pub request_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AwaitEnergyArgs {
    #[serde(rename = "minLevel")]
    pub min_level: f64,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct EndConversationArgs {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SnoozeConversationArgs {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub minutes: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct McpAddServerArgs {
    pub id: String,
    pub transport: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub enum CoreToolCall {
    Respond(RespondArgs),
    Think(ThinkArgs),
    SelectConversation(SelectConversationArgs),
    AwaitEnergy(AwaitEnergyArgs),
    EndConversation(EndConversationArgs),
    SnoozeConversation(SnoozeConversationArgs),
    McpAddServer(Value),
    McpListServers,
}

#[derive(Debug, Clone)]
pub enum DispatchTarget {
    Core(CoreToolCall),
    Mcp { server_id: String, original_name: String, arguments: Value },
}

/// Resolves a raw LLM tool call into something executable, or an error
/// string to surface back to the LLM as a tool-result (spec §4.E).
pub fn resolve(name: &str, arguments: Value, exposed: &[ExposedMcpTool]) -> Result<DispatchTarget, String> {
    if core_tools::is_core_tool(name) {
        return resolve_core(name, arguments).map(DispatchTarget::Core);
    }

    if let Some(tool) = exposed.iter().find(|t| t.exposed_name == name) {
        return Ok(DispatchTarget::Mcp {
            server_id: tool.server_id.clone(),
            original_name: tool.original_name.clone(),
            arguments,
        });
    }

    Err(format!("unknown tool '{name}'"))
}

fn resolve_core(name: &str, arguments: Value) -> Result<CoreToolCall, String> {
    let decode_err = |e: serde_json::Error| format!("invalid arguments for '{name}': {e}");

    match name {
        core_tools::RESPOND => serde_json::from_value(arguments).map(CoreToolCall::Respond).map_err(decode_err),
        core_tools::THINK => serde_json::from_value(arguments).map(CoreToolCall::Think).map_err(decode_err),
        core_tools::SELECT_CONVERSATION => {
            serde_json::from_value(arguments).map(CoreToolCall::SelectConversation).map_err(decode_err)
        }
        core_tools::AWAIT_ENERGY => {
            serde_json::from_value(arguments).map(CoreToolCall::AwaitEnergy).map_err(decode_err)
        }
        core_tools::END_CONVERSATION => {
            serde_json::from_value(arguments).map(CoreToolCall::EndConversation).map_err(decode_err)
        }
        core_tools::SNOOZE_CONVERSATION => {
            serde_json::from_value(arguments).map(CoreToolCall::SnoozeConversation).map_err(decode_err)
        }
        core_tools::MCP_ADD_SERVER => Ok(CoreToolCall::McpAddServer(arguments)),
        core_tools::MCP_LIST_SERVERS => Ok(CoreToolCall::McpListServers),
        _ => Err(format!("unknown core tool '{name}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_known_core_tool() {
        let resolved = resolve(
            core_tools::RESPOND,
            json!({"requestId": "r1", "content": "hi"}),
            &[],
        )
        .unwrap();
        assert!(matches!(resolved, DispatchTarget::Core(CoreToolCall::Respond(_))));
    }

    #[test]
    fn decode_failure_reports_a_message_not_a_panic() {
        let err = resolve(core_tools::RESPOND, json!({"content": 5}), &[]).unwrap_err();
        assert!(err.contains("invalid arguments"));
    }

    #[test]
    fn unknown_tool_is_an_error_string() {
        let err = resolve("nonexistent", json!({}), &[]).unwrap_err();
        assert!(err.contains("unknown tool"));
    }

    #[test]
    fn mcp_tool_resolves_to_server_and_original_name() {
        let exposed = vec![ExposedMcpTool {
            exposed_name: "fs-local_read_file".into(),
            original_name: "read_file".into(),
            server_id: "fs-local".into(),
            description: String::new(),
            input_schema: json!({}),
        }];
        let resolved = resolve("fs-local_read_file", json!({"path": "/tmp"}), &exposed).unwrap();
        match resolved {
            DispatchTarget::Mcp { server_id, original_name, .. } => {
                assert_eq!(server_id, "fs-local");
                assert_eq!(original_name, "read_file");
            }
            _ => panic!("expected Mcp dispatch"),
        }
    }
}
