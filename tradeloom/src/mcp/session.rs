//! MCP session over stdio: spawn the server process, speak newline-delimited
//! JSON-RPC on its pipes.
//!
//! Performs the initialize handshake on connect, then serves `tools/list` and
//! `tools/call`. Server-initiated `roots/list` requests are answered with an
//! empty root set (tools-only client); other server requests and notifications
//! are skipped while waiting for a matching response id.

use std::time::Duration;

use jsonrpc_core::{Id, MethodCall, Notification, Output, Params, Version};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{ToolSourceError, ToolSpec, MCP_PROTOCOL_VERSION};

/// Handshake timeout, independent of the per-call timeout.
const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(20);

/// Converts a JSON value into JSON-RPC params. MCP params are always objects.
pub(crate) fn to_params(value: Value) -> Params {
    match value {
        Value::Object(map) => Params::Map(map),
        Value::Array(items) => Params::Array(items),
        Value::Null => Params::None,
        other => Params::Array(vec![other]),
    }
}

/// Maps an MCP `tools/list` result to tool specs.
pub(crate) fn tool_specs_from_result(result: &Value) -> Result<Vec<ToolSpec>, ToolSourceError> {
    let items = result
        .get("tools")
        .and_then(Value::as_array)
        .ok_or_else(|| ToolSourceError::Transport("tools/list result has no tools".into()))?;
    let mut specs = Vec::with_capacity(items.len());
    for item in items {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolSourceError::Transport("tool entry without name".into()))?;
        specs.push(ToolSpec {
            name: name.to_string(),
            description: item
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
            input_schema: item.get("inputSchema").cloned().unwrap_or_else(|| json!({})),
        });
    }
    Ok(specs)
}

/// MCP session over stdio: spawned server process plus its pipe endpoints.
///
/// **Interaction**: Created by the broker for `transport: "stdio"` entries
/// (the config `url` is the command line, whitespace-split). Exclusive access
/// is serialized by the broker's per-server mutex.
pub struct McpSession {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    timeout: Duration,
    next_id: u64,
}

impl McpSession {
    /// Spawns the server from a whitespace-split command line and completes
    /// the initialize handshake.
    pub async fn connect(command_line: &str, timeout: Duration) -> Result<Self, ToolSourceError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ToolSourceError::Transport("empty stdio command".into()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolSourceError::Transport(format!("spawn {program}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolSourceError::Transport("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolSourceError::Transport("child stdout unavailable".into()))?;

        let mut session = Self {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            timeout,
            next_id: 0,
        };
        session.initialize().await?;
        Ok(session)
    }

    /// MCP initialize handshake: `initialize` request, then the
    /// `notifications/initialized` notification.
    async fn initialize(&mut self) -> Result<(), ToolSourceError> {
        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": "tradeloom-mcp",
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        self.request_with_timeout("initialize", params, INITIALIZE_TIMEOUT)
            .await
            .map_err(|e| ToolSourceError::Transport(format!("initialize: {e}")))?;
        self.notify("notifications/initialized", json!({})).await
    }

    async fn send_line(&mut self, payload: String) -> Result<(), ToolSourceError> {
        self.stdin
            .write_all(payload.as_bytes())
            .await
            .map_err(|e| ToolSourceError::Transport(format!("write: {e}")))?;
        self.stdin
            .write_all(b"\n")
            .await
            .map_err(|e| ToolSourceError::Transport(format!("write: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ToolSourceError::Transport(format!("flush: {e}")))
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), ToolSourceError> {
        let notification = Notification {
            jsonrpc: Some(Version::V2),
            method: method.to_string(),
            params: to_params(params),
        };
        let payload = serde_json::to_string(&notification)
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        self.send_line(payload).await
    }

    /// Sends a request and waits for the matching response within `timeout`.
    async fn request_with_timeout(
        &mut self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ToolSourceError> {
        self.next_id += 1;
        let id = Id::Num(self.next_id);
        let call = MethodCall {
            jsonrpc: Some(Version::V2),
            method: method.to_string(),
            params: to_params(params),
            id: id.clone(),
        };
        let payload =
            serde_json::to_string(&call).map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        self.send_line(payload).await?;
        self.wait_for_result(&id, timeout).await
    }

    /// Sends a request with the session's configured per-call timeout.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<Value, ToolSourceError> {
        let timeout = self.timeout;
        self.request_with_timeout(method, params, timeout).await
    }

    /// Reads lines until the response with `expected` id arrives.
    ///
    /// Answers server `roots/list` requests with empty roots; skips other
    /// server requests, notifications and non-matching responses.
    async fn wait_for_result(
        &mut self,
        expected: &Id,
        timeout: Duration,
    ) -> Result<Value, ToolSourceError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let remaining = deadline
                .checked_duration_since(tokio::time::Instant::now())
                .ok_or_else(|| {
                    ToolSourceError::Transport("timeout waiting for response".into())
                })?;
            let line = tokio::time::timeout(remaining, self.lines.next_line())
                .await
                .map_err(|_| ToolSourceError::Transport("timeout waiting for response".into()))?
                .map_err(|e| ToolSourceError::Transport(format!("read: {e}")))?
                .ok_or_else(|| ToolSourceError::Transport("server closed stdout".into()))?;

            let value: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, line = %line, "unparseable JSON-RPC line");
                    continue;
                }
            };

            if value.get("method").is_some() {
                let is_roots_list = value["method"] == "roots/list";
                if let Some(request_id) = value.get("id") {
                    if is_roots_list {
                        let id: Id = serde_json::from_value(request_id.clone())
                            .unwrap_or(Id::Null);
                        let reply = jsonrpc_core::Success {
                            jsonrpc: Some(Version::V2),
                            result: json!({ "roots": [] }),
                            id,
                        };
                        let payload = serde_json::to_string(&reply)
                            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
                        self.send_line(payload).await?;
                    }
                }
                continue;
            }

            match serde_json::from_value::<Output>(value) {
                Ok(Output::Success(success)) if success.id == *expected => {
                    return Ok(success.result)
                }
                Ok(Output::Failure(failure)) if failure.id == *expected => {
                    return Err(ToolSourceError::JsonRpc(failure.error.message))
                }
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "unexpected JSON-RPC message");
                    continue;
                }
            }
        }
    }

    /// MCP `tools/list`.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        let result = self.request("tools/list", json!({})).await?;
        tool_specs_from_result(&result)
    }

    /// MCP `tools/call`: returns the raw result value.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: Value,
    ) -> Result<Value, ToolSourceError> {
        self.request(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }

    /// Kills the server process.
    pub async fn shutdown(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Connecting to a nonexistent binary fails with a transport error.
    #[tokio::test]
    async fn connect_to_missing_binary_fails() {
        let result =
            McpSession::connect("definitely-not-a-real-binary-xyz", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ToolSourceError::Transport(_))));
    }

    /// **Scenario**: An empty stdio command is rejected.
    #[tokio::test]
    async fn connect_with_empty_command_fails() {
        let result = McpSession::connect("   ", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ToolSourceError::Transport(_))));
    }

    /// **Scenario**: to_params maps objects, arrays, null and scalars sensibly.
    #[test]
    fn to_params_maps_value_kinds() {
        assert!(matches!(to_params(json!({"a": 1})), Params::Map(_)));
        assert!(matches!(to_params(json!([1, 2])), Params::Array(_)));
        assert!(matches!(to_params(Value::Null), Params::None));
        assert!(matches!(to_params(json!(3)), Params::Array(_)));
    }

    /// **Scenario**: tools/list results map to ToolSpec with schema fallback.
    #[test]
    fn tool_specs_from_result_maps_entries() {
        let result = json!({"tools": [
            {"name": "get_quote", "description": "quotes", "inputSchema": {"type": "object"}},
            {"name": "bare_tool"}
        ]});
        let specs = tool_specs_from_result(&result).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "get_quote");
        assert_eq!(specs[0].description.as_deref(), Some("quotes"));
        assert_eq!(specs[1].input_schema, json!({}));

        assert!(tool_specs_from_result(&json!({})).is_err());
        assert!(tool_specs_from_result(&json!({"tools": [{"description": "no name"}]})).is_err());
    }
}
