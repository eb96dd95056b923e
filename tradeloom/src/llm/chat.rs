//! Tool-call loop: one `chat` that hides multi-round tool execution.
//!
//! Given a system prompt, prior messages and a user request, keeps invoking
//! the LLM while it requests tools, executing each requested tool through the
//! broker in the order the model emitted them and appending the results to the
//! conversation. Stops when the model answers with plain text, when the round
//! cap is hit, or when the cancel token fires.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::mcp::{ToolBroker, ToolSpec};
use crate::message::Message;
use crate::recorder::SessionRecorder;

/// Hard cap on tool-call iterations per `chat_with_tools` call.
///
/// Exceeding it returns the last assistant content with `rounds_exhausted`
/// set, so the caller can record a warning.
pub const MAX_TOOL_ROUNDS: usize = 8;

/// One executed tool call: parsed arguments in, raw broker result out.
#[derive(Debug, Clone)]
pub struct ToolExchange {
    pub tool_name: String,
    pub arguments: Value,
    pub result: Value,
}

/// Result of one `chat_with_tools` call.
#[derive(Debug, Default)]
pub struct ChatOutcome {
    /// Final assistant content (last content seen when cancelled or exhausted).
    pub content: String,
    /// Number of tool rounds executed.
    pub tool_rounds: usize,
    /// True when the round cap was hit while the model still wanted tools.
    pub rounds_exhausted: bool,
    /// True when at least one tool was executed.
    pub mcp_used: bool,
    /// True when the cancel token fired mid-conversation.
    pub cancelled: bool,
    /// Every executed tool call, in execution order.
    pub tool_calls: Vec<ToolExchange>,
}

/// Parses a tool-call argument string to a JSON value. Empty arguments become
/// an empty object; parse failures are logged and degrade to an empty object
/// so a malformed model emission cannot wedge the loop.
fn parse_tool_arguments(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, arguments = %arguments, "tool arguments JSON parse failed, using empty object");
            serde_json::json!({})
        }
    }
}

/// Extracts readable text from an MCP tool result for the conversation.
///
/// MCP `tools/call` results carry `content: [{type: "text", text: ...}]`;
/// error payloads carry `{"error": ...}`. Anything else is compact JSON.
pub fn result_text(result: &Value) -> String {
    if let Some(items) = result.get("content").and_then(Value::as_array) {
        let texts: Vec<&str> = items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect();
        if !texts.is_empty() {
            return texts.join("\n");
        }
    }
    if let Some(s) = result.as_str() {
        return s.to_string();
    }
    result.to_string()
}

/// One agent conversation with the model, tool rounds included.
///
/// The caller supplies the merged system prompt, any prior messages, the user
/// request and the tool schemas already gated for this agent. Tool executions
/// are recorded to the session log as they happen; the executed calls are also
/// returned so the caller can mirror them into the analysis state.
#[allow(clippy::too_many_arguments)]
pub async fn chat_with_tools(
    llm: &dyn LlmClient,
    broker: &dyn ToolBroker,
    recorder: &SessionRecorder,
    agent_name: &str,
    system: String,
    history: &[Message],
    user: String,
    tools: Vec<ToolSpec>,
    cancel: &CancellationToken,
) -> Result<ChatOutcome, AgentError> {
    let mut messages: Vec<Message> = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system));
    messages.extend_from_slice(history);
    messages.push(Message::user(user));

    let mut outcome = ChatOutcome::default();

    loop {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            return Ok(outcome);
        }

        let response = if tools.is_empty() {
            llm.invoke(&messages).await?
        } else {
            llm.invoke_with_tools(&messages, &tools).await?
        };

        outcome.content = response.content.clone();
        messages.push(Message::assistant(response.content));

        if response.tool_calls.is_empty() {
            return Ok(outcome);
        }
        if outcome.tool_rounds >= MAX_TOOL_ROUNDS {
            warn!(
                agent = %agent_name,
                rounds = outcome.tool_rounds,
                "tool round cap reached, returning last assistant content"
            );
            outcome.rounds_exhausted = true;
            return Ok(outcome);
        }

        for call in &response.tool_calls {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                return Ok(outcome);
            }
            let arguments = parse_tool_arguments(&call.arguments);
            debug!(agent = %agent_name, tool = %call.name, "executing tool call");
            let result = broker
                .call_tool_for_agent(agent_name, &call.name, arguments.clone())
                .await;
            recorder.add_mcp_tool_call(agent_name, &call.name, &arguments, &result);
            messages.push(Message::user(format!(
                "Tool {} returned: {}",
                call.name,
                result_text(&result)
            )));
            outcome.tool_calls.push(ToolExchange {
                tool_name: call.name.clone(),
                arguments,
                result,
            });
        }
        outcome.mcp_used = true;
        outcome.tool_rounds += 1;
    }
}
