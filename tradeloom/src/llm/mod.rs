//! LLM client abstraction for the agent harness.
//!
//! Every agent's step depends on a callable that turns a message list into
//! assistant text and optional tool_calls; this module defines the trait, the
//! OpenAI-compatible implementation, a mock for tests, and the tool-call loop
//! that hides multi-round tool execution behind a single `chat` call.

mod chat;
mod mock;
mod openai;

pub use chat::{chat_with_tools, ChatOutcome, ToolExchange, MAX_TOOL_ROUNDS};
pub use mock::MockLlm;
pub use openai::ChatOpenAI;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::mcp::ToolSpec;
use crate::message::Message;

/// Tool choice mode for chat completions: when tools are present, controls
/// whether the model may choose (auto), must not use (none), or must use
/// (required).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    /// Model can pick between a message and tool calls. Default when tools are present.
    #[default]
    Auto,
    /// Model will not call any tool.
    None,
    /// Model must call one or more tools.
    Required,
}

impl std::str::FromStr for ToolChoiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "none" => Ok(Self::None),
            "required" => Ok(Self::Required),
            _ => Err(format!(
                "unknown tool_choice: {} (use auto, none, or required)",
                s
            )),
        }
    }
}

/// A single tool invocation produced by the model.
///
/// Aligns with MCP `tools/call`: `name` and `arguments` (JSON string).
/// Optional `id` correlates with the provider's tool-call id.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ToolCall {
    /// Tool name as listed in the broker catalog.
    pub name: String,
    /// Arguments as a JSON string; parsed before the broker call.
    pub arguments: String,
    /// Provider-assigned id, when present.
    pub id: Option<String>,
}

/// Token usage for one LLM call (prompt + completion).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Response from an LLM completion: assistant text and optional tool calls.
pub struct LlmResponse {
    /// Assistant message content (plain text).
    pub content: String,
    /// Tool calls requested this turn; empty means the model is done.
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this call, when the provider returns it.
    pub usage: Option<LlmUsage>,
}

/// LLM client: given messages, returns assistant text and optional tool_calls.
///
/// Implementations: `MockLlm` (deterministic, for tests) and `ChatOpenAI`
/// (OpenAI-compatible Chat Completions). The client is stateless per call; the
/// tool-call loop lives above it in [`chat_with_tools`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invoke one turn: read messages, return assistant content and optional tool_calls.
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, AgentError>;

    /// Invoke one turn with per-call tool schemas.
    ///
    /// Default implementation ignores `tools` and calls `invoke`, which is the
    /// right behavior for clients that cannot do tool calling (and for mocks).
    async fn invoke_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<LlmResponse, AgentError> {
        let _ = tools;
        self.invoke(messages).await
    }
}
