// src/llm/mock.rs
// Deterministic LLM providers shipped for tests and for running the loop
// without a real inference backend wired up.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::error::Result;
use crate::tools::core_tools;

use super::provider::{LlmProvider, LlmRequest, LlmResponse, ToolCall};

/// Answers every invocation with a `respond` tool call built from the last
/// history message. Converges in one cycle, which is what the seed
/// scenarios (spec §8 S1-S3) expect of "a" model, not a specific one.
pub struct MockLlmProvider {
    request_id_hint: Mutex<Option<String>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self { request_id_hint: Mutex::new(None) }
    }

    /// The loop doesn't thread `requestId` through `LlmRequest` (it lives in
    /// the ephemeral status text instead); tests that need a specific id in
    /// the emitted tool call can set it explicitly.
    pub fn with_request_id(self, request_id: impl Into<String>) -> Self {
        *self.request_id_hint.lock().unwrap() = Some(request_id.into());
        self
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn invoke(&self, request: LlmRequest) -> Result<LlmResponse> {
        let request_id = self
            .request_id_hint
            .lock()
            .unwrap()
            .clone()
            .or_else(|| extract_request_id(&request.ephemeral_status))
            .unwrap_or_else(|| "unknown".to_string());

        let last_user = request
            .history
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let content = format!("mock response to: {last_user}");

        Ok(LlmResponse {
            text: Some(content.clone()),
            tool_call: Some(ToolCall {
                name: core_tools::RESPOND.to_string(),
                arguments: json!({"requestId": request_id, "content": content}),
            }),
        })
    }
}

fn extract_request_id(ephemeral_status: &str) -> Option<String> {
    ephemeral_status
        .lines()
        .find_map(|line| line.strip_prefix("focus: ").map(|s| s.trim().to_string()))
}

/// A fixed sequence of canned responses, returned one per call and then
/// repeating the last entry. Used by integration tests that need to drive
/// the loop through a specific sequence of tool calls (think, then respond;
/// a tool call followed by a model switch; etc).
pub struct ScriptedLlmProvider {
    script: Vec<LlmResponse>,
    cursor: AtomicUsize,
}

impl ScriptedLlmProvider {
    pub fn new(script: Vec<LlmResponse>) -> Self {
        Self { script, cursor: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn invoke(&self, _request: LlmRequest) -> Result<LlmResponse> {
        let idx = self.cursor.fetch_add(1, Ordering::SeqCst);
        let idx = idx.min(self.script.len().saturating_sub(1));
        Ok(self.script.get(idx).cloned().unwrap_or_default())
    }
}
