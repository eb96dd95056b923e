//! MCP session over Streamable HTTP: POST JSON-RPC to a URL, parse the JSON
//! (or SSE) response body.
//!
//! Implements the MCP Streamable HTTP transport: POST a single JSON-RPC
//! message with `Accept: application/json, text/event-stream`, track the
//! `MCP-Session-Id` header across requests, send the `MCP-Protocol-Version`
//! header. Servers configured as `sse` answer requests with short event-stream
//! bodies; both body shapes are parsed here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use jsonrpc_core::{Id, MethodCall, Notification, Version};
use serde::Deserialize;
use serde_json::{json, Value};

use super::session::{to_params, tool_specs_from_result};
use super::{ToolSourceError, ToolSpec, MCP_PROTOCOL_VERSION};

/// Request id for initialize.
const INITIALIZE_REQUEST_ID: &str = "tradeloom-mcp-initialize";

/// JSON-RPC error object in a response body.
#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    #[allow(dead_code)]
    code: i64,
    message: String,
}

/// JSON-RPC response body (id + result or error).
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    id: Option<Value>,
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

impl JsonRpcResponse {
    fn is_complete(&self) -> bool {
        self.result.is_some() || self.error.is_some()
    }
}

/// Parses a JSON-RPC response from an HTTP body. Supports both
/// `application/json` (single object) and `text/event-stream` (data lines
/// carrying JSON-RPC messages); returns the first response that has a result
/// or an error.
fn parse_json_rpc_from_body(
    body: &str,
    content_type: Option<&reqwest::header::HeaderValue>,
) -> Result<JsonRpcResponse, ToolSourceError> {
    let is_sse = content_type
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("text/event-stream"))
        .unwrap_or(false);

    if !is_sse {
        return serde_json::from_str(body)
            .map_err(|e| ToolSourceError::Transport(format!("response json: {e}")));
    }

    let mut data_buffer = String::new();
    let try_buffer = |buffer: &mut String| -> Option<JsonRpcResponse> {
        if buffer.is_empty() {
            return None;
        }
        match serde_json::from_str::<JsonRpcResponse>(buffer) {
            Ok(r) if r.is_complete() => Some(r),
            _ => None,
        }
    };

    for line in body.lines() {
        if let Some(data) = line.strip_prefix("data: ") {
            if data == "[DONE]" || data.is_empty() {
                if let Some(r) = try_buffer(&mut data_buffer) {
                    return Ok(r);
                }
                data_buffer.clear();
                continue;
            }
            if !data_buffer.is_empty() {
                data_buffer.push('\n');
            }
            data_buffer.push_str(data);
            if let Some(r) = try_buffer(&mut data_buffer) {
                return Ok(r);
            }
        } else if line.trim().is_empty() {
            if let Some(r) = try_buffer(&mut data_buffer) {
                return Ok(r);
            }
            data_buffer.clear();
        }
    }
    if let Some(r) = try_buffer(&mut data_buffer) {
        return Ok(r);
    }
    Err(ToolSourceError::Transport(
        "SSE stream: no JSON-RPC response (result/error) found".into(),
    ))
}

/// MCP session over Streamable HTTP.
///
/// Performs the initialize handshake on construction, then serves
/// request/response for `tools/list` and `tools/call`. Uses async reqwest
/// with the configured per-call timeout.
pub struct McpHttpSession {
    client: reqwest::Client,
    url: String,
    /// Session id from the server's MCP-Session-Id header; echoed on
    /// subsequent requests.
    session_id: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl McpHttpSession {
    /// Creates a new HTTP MCP session and completes the initialize handshake.
    ///
    /// `url` must be the MCP endpoint; `timeout` bounds every request
    /// including initialize.
    pub async fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ToolSourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let session = Self {
            client,
            url: url.into(),
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(0),
        };
        session.initialize().await?;
        Ok(session)
    }

    /// Test constructor: a session that never connected. Used to assemble
    /// broker fixtures without a live server.
    #[cfg(test)]
    pub(crate) fn disconnected(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            session_id: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    fn post(&self, body: Vec<u8>) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .header("MCP-Protocol-Version", MCP_PROTOCOL_VERSION)
            .body(body);
        if let Ok(guard) = self.session_id.lock() {
            if let Some(ref sid) = *guard {
                req = req.header("MCP-Session-Id", sid.as_str());
            }
        }
        req
    }

    /// MCP initialize: POST initialize, capture MCP-Session-Id, POST
    /// notifications/initialized.
    async fn initialize(&self) -> Result<(), ToolSourceError> {
        let call = MethodCall {
            jsonrpc: Some(Version::V2),
            method: "initialize".to_string(),
            params: to_params(json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "clientInfo": {
                    "name": "tradeloom-mcp",
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
            id: Id::Str(INITIALIZE_REQUEST_ID.to_string()),
        };
        let body =
            serde_json::to_vec(&call).map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;

        let status = resp.status();
        if let Some(sid) = resp
            .headers()
            .get("MCP-Session-Id")
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut guard) = self.session_id.lock() {
                *guard = Some(sid.to_string());
            }
        }
        if status != reqwest::StatusCode::ACCEPTED {
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(ToolSourceError::Transport(format!(
                    "initialize HTTP {status}: {}",
                    if text.is_empty() { "no body" } else { &text }
                )));
            }
            let content_type = resp.headers().get("content-type").cloned();
            let text = resp
                .text()
                .await
                .map_err(|e| ToolSourceError::Transport(format!("initialize body: {e}")))?;
            let parsed = parse_json_rpc_from_body(&text, content_type.as_ref())
                .map_err(|e| ToolSourceError::Transport(format!("initialize: {e}")))?;
            if let Some(err) = parsed.error {
                return Err(ToolSourceError::JsonRpc(format!(
                    "initialize: {}",
                    err.message
                )));
            }
        }

        let notification = Notification {
            jsonrpc: Some(Version::V2),
            method: "notifications/initialized".to_string(),
            params: to_params(json!({})),
        };
        let body = serde_json::to_vec(&notification)
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let status = resp.status();
        if status != reqwest::StatusCode::ACCEPTED && !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ToolSourceError::Transport(format!(
                "notifications/initialized HTTP {status}: {}",
                if text.is_empty() { "no body" } else { &text }
            )));
        }
        Ok(())
    }

    /// Sends one JSON-RPC request and returns the parsed result.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ToolSourceError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let call = MethodCall {
            jsonrpc: Some(Version::V2),
            method: method.to_string(),
            params: to_params(params),
            id: Id::Num(id),
        };
        let body =
            serde_json::to_vec(&call).map_err(|e| ToolSourceError::Transport(e.to_string()))?;

        let resp = self
            .post(body)
            .send()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ToolSourceError::Transport(format!(
                "{method} HTTP {status}: {}",
                if text.is_empty() { "no body" } else { &text }
            )));
        }
        let content_type = resp.headers().get("content-type").cloned();
        let text = resp
            .text()
            .await
            .map_err(|e| ToolSourceError::Transport(e.to_string()))?;
        let parsed = parse_json_rpc_from_body(&text, content_type.as_ref())?;
        if let Some(err) = parsed.error {
            return Err(ToolSourceError::JsonRpc(err.message));
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    /// MCP `tools/list`.
    pub async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolSourceError> {
        let result = self.request("tools/list", json!({})).await?;
        tool_specs_from_result(&result)
    }

    /// MCP `tools/call`: returns the raw result value.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolSourceError> {
        self.request(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        )
        .await
    }
}
