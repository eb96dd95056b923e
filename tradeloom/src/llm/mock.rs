//! Mock LLM for tests and deterministic runs.
//!
//! Returns fixed assistant content and optional fixed tool_calls, or delegates
//! to a responder closure that can inspect the message list (e.g. to answer
//! per agent, or to fail on a chosen turn).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::llm::{LlmClient, LlmResponse, ToolCall};
use crate::message::Message;

/// Responder closure: full message list in, response (or failure) out.
pub type ResponderFn =
    Arc<dyn Fn(&[Message]) -> Result<LlmResponse, AgentError> + Send + Sync + 'static>;

/// Mock LLM: fixed assistant text and optional tool_calls, or a responder.
///
/// Configurable to return one fixed tool call or none, so the chat loop can
/// run a tool round or finish immediately. Stateful mode: the first invoke
/// returns (content, tool_calls), later invokes return (second_content, []).
///
/// **Interaction**: Implements `LlmClient`; used by unit and integration
/// tests in place of `ChatOpenAI`.
pub struct MockLlm {
    /// Assistant content to return (or first call when stateful).
    content: String,
    /// Tool calls to return (or first call when stateful).
    tool_calls: Vec<ToolCall>,
    /// When Some, first invoke() returns (content, tool_calls), later (second_content, []).
    call_count: Option<AtomicUsize>,
    /// Second response content (stateful mode).
    second_content: Option<String>,
    /// When set, overrides everything else.
    responder: Option<ResponderFn>,
}

impl MockLlm {
    /// Creates a mock that returns assistant text and no tool_calls.
    pub fn with_no_tool_calls(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
            call_count: None,
            second_content: None,
            responder: None,
        }
    }

    /// Creates a mock with custom content and tool_calls.
    pub fn new(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            call_count: None,
            second_content: None,
            responder: None,
        }
    }

    /// Creates a stateful mock: the first invoke returns the given tool call,
    /// subsequent invokes return `second_content` with no tool_calls. Used to
    /// exercise one full tool round in the chat loop.
    pub fn first_tool_then_answer(
        tool: ToolCall,
        first_content: impl Into<String>,
        second_content: impl Into<String>,
    ) -> Self {
        Self {
            content: first_content.into(),
            tool_calls: vec![tool],
            call_count: Some(AtomicUsize::new(0)),
            second_content: Some(second_content.into()),
            responder: None,
        }
    }

    /// Creates a mock backed by a responder closure.
    pub fn with_responder(responder: ResponderFn) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![],
            call_count: None,
            second_content: None,
            responder: Some(responder),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(&self, messages: &[Message]) -> Result<LlmResponse, AgentError> {
        if let Some(ref responder) = self.responder {
            return responder(messages);
        }
        let (content, tool_calls) = match &self.call_count {
            Some(c) => {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    (self.content.clone(), self.tool_calls.clone())
                } else {
                    (
                        self.second_content
                            .as_deref()
                            .unwrap_or(&self.content)
                            .to_string(),
                        vec![],
                    )
                }
            }
            None => (self.content.clone(), self.tool_calls.clone()),
        };
        Ok(LlmResponse {
            content,
            tool_calls,
            usage: None,
        })
    }
}
