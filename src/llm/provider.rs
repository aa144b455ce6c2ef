// src/llm/provider.rs
// LLM invocation boundary (spec §4.F step 5). The physical inference engine
// is out of scope (spec §1); this trait is the seam a real backend plugs
// into.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// One turn's worth of context handed to the model (spec §4.F step 4).
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub system_prompt: String,
    pub ephemeral_status: String,
    pub history: Vec<HistoryMessage>,
    pub model: String,
    pub tools: Vec<crate::tools::ToolDescriptor>,
}

#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

/// Either free text, a tool call, or both (spec §4.F step 5).
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: Option<String>,
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse>;
}
