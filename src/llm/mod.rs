// src/llm/mod.rs
// The LLM invocation boundary and its in-crate mock implementations.

pub mod mock;
pub mod provider;

pub use mock::{MockLlmProvider, ScriptedLlmProvider};
pub use provider::{HistoryMessage, LlmProvider, LlmRequest, LlmResponse, ToolCall};
