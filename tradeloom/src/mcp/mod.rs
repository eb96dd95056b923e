//! MCP tool broker: multi-server discovery, per-agent gating, uniform calls.
//!
//! The broker connects to every configured MCP server, aggregates their tool
//! catalogs into one flat list annotated by origin, and gates invocations by
//! the per-agent permission table. Permissions are agent-level booleans: an
//! enabled agent sees the entire catalog. A single server failing to connect
//! degrades to "no tools from that server"; a tool call on a missing or
//! disconnected tool returns a structured error payload, never an error.

mod mock;
mod session;
mod session_http;

pub use mock::MockToolBroker;
pub use session::McpSession;
pub use session_http::McpHttpSession;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{AgentPermissions, McpConfig, McpTransport};

/// MCP protocol version sent in the initialize handshake.
pub(crate) const MCP_PROTOCOL_VERSION: &str = "2025-11-25";

/// Tool specification, aligned with an MCP `tools/list` result item.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolSpec {
    /// Tool name (used in MCP tools/call). Unique across servers.
    pub name: String,
    /// Human-readable description for the LLM.
    pub description: Option<String>,
    /// JSON Schema for arguments (MCP inputSchema).
    pub input_schema: Value,
}

/// Errors from connecting to a server or exchanging JSON-RPC with it.
#[derive(Debug, thiserror::Error)]
pub enum ToolSourceError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("MCP/transport error: {0}")]
    Transport(String),
    #[error("JSON-RPC error: {0}")]
    JsonRpc(String),
    /// The same tool name is exposed by two servers; routing would be ambiguous.
    #[error("duplicate tool name {name} on servers {first} and {second}")]
    DuplicateTool {
        name: String,
        first: String,
        second: String,
    },
}

/// Tool routing and gating seam used by the chat loop and the agent harness.
///
/// `McpToolBroker` is the production implementation; `MockToolBroker` serves
/// tests. Calls return data, never errors: failures become `{"error": ...}`
/// payloads the model can read.
#[async_trait]
pub trait ToolBroker: Send + Sync {
    /// The flat catalog if the agent is permitted; empty otherwise.
    fn tools_for_agent(&self, agent_name: &str) -> Vec<ToolSpec>;

    /// Checks permission, resolves the tool, forwards the call to the
    /// originating server, returns the raw result (or an error payload).
    async fn call_tool_for_agent(&self, agent_name: &str, tool_name: &str, args: Value) -> Value;
}

/// Structured catalog view grouped by server, for diagnostics and UIs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CatalogSummary {
    pub servers: BTreeMap<String, ServerToolsInfo>,
    pub total_tools: usize,
    pub server_count: usize,
    pub agent_permissions: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerToolsInfo {
    pub name: String,
    pub tools: Vec<ToolInfo>,
    pub tool_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Value,
    pub required: Vec<String>,
}

impl ToolInfo {
    fn from_spec(spec: &ToolSpec) -> Self {
        let parameters = spec
            .input_schema
            .get("properties")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        let required = spec
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            parameters,
            required,
        }
    }
}

/// Presentational grouping for tools whose transport did not name a server.
///
/// Routing is always by the tool's declared origin; this heuristic only
/// decides which bucket an unattributed tool appears under in `tools_info`.
pub(crate) fn server_group(server_name: &str, tool_name: &str) -> String {
    if !server_name.is_empty() {
        return server_name.to_string();
    }
    let lower = tool_name.to_lowercase();
    if lower.contains("finance") || lower.contains("stock") {
        "finance-data-server".to_string()
    } else {
        "default".to_string()
    }
}

/// One connected server: declared name, session handle, and its tool list.
struct McpServer {
    name: String,
    session: McpServerSession,
    tools: Vec<ToolSpec>,
}

/// Transport kind behind one server handle.
enum McpServerSession {
    /// Spawned process; exclusive access serialized by the mutex.
    Stdio(tokio::sync::Mutex<McpSession>),
    /// Streamable HTTP (also parses SSE response bodies).
    Http(McpHttpSession),
}

/// Returns an error when two servers expose the same tool name.
fn check_duplicate_tools(servers: &[Arc<McpServer>]) -> Result<(), ToolSourceError> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for server in servers {
        for tool in &server.tools {
            if let Some(first) = seen.insert(tool.name.as_str(), server.name.as_str()) {
                return Err(ToolSourceError::DuplicateTool {
                    name: tool.name.clone(),
                    first: first.to_string(),
                    second: server.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// The production tool broker.
///
/// Holds one client per configured MCP server for the lifetime of the run.
/// Sessions are shared across agents and reused sequentially. Initialization
/// warnings (unreachable servers) are retained so each run can mirror them
/// into its session log.
pub struct McpToolBroker {
    permissions: AgentPermissions,
    servers: RwLock<Vec<Arc<McpServer>>>,
    init_warnings: RwLock<Vec<String>>,
}

impl McpToolBroker {
    /// Creates a broker with no connected servers (no-tool mode until
    /// `initialize` succeeds).
    pub fn new(permissions: AgentPermissions) -> Self {
        Self {
            permissions,
            servers: RwLock::new(Vec::new()),
            init_warnings: RwLock::new(Vec::new()),
        }
    }

    /// Connects each configured server and aggregates the tool catalog.
    ///
    /// A server that fails to connect or list tools is skipped with a warning;
    /// the broker still initializes. A duplicate tool name across servers is a
    /// configuration error. Returns the number of connected servers.
    pub async fn initialize(&self, config: &McpConfig) -> Result<usize, ToolSourceError> {
        let mut connected: Vec<Arc<McpServer>> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        for (name, server_config) in &config.servers {
            let session = match server_config.transport {
                McpTransport::Stdio => {
                    match McpSession::connect(&server_config.url, server_config.timeout()).await {
                        Ok(s) => McpServerSession::Stdio(tokio::sync::Mutex::new(s)),
                        Err(e) => {
                            warn!(server = %name, error = %e, "MCP connect failed");
                            warnings.push(format!("MCP server {name} unreachable: {e}"));
                            continue;
                        }
                    }
                }
                McpTransport::Http | McpTransport::Sse => {
                    match McpHttpSession::new(server_config.url.as_str(), server_config.timeout())
                        .await
                    {
                        Ok(s) => McpServerSession::Http(s),
                        Err(e) => {
                            warn!(server = %name, error = %e, "MCP connect failed");
                            warnings.push(format!("MCP server {name} unreachable: {e}"));
                            continue;
                        }
                    }
                }
            };

            let tools = match &session {
                McpServerSession::Stdio(mutex) => mutex.lock().await.list_tools().await,
                McpServerSession::Http(http) => http.list_tools().await,
            };
            let tools = match tools {
                Ok(t) => t,
                Err(e) => {
                    warn!(server = %name, error = %e, "tools/list failed");
                    warnings.push(format!("MCP server {name} tool discovery failed: {e}"));
                    continue;
                }
            };

            info!(server = %name, tool_count = tools.len(), "MCP server connected");
            connected.push(Arc::new(McpServer {
                name: name.clone(),
                session,
                tools,
            }));
        }

        check_duplicate_tools(&connected)?;

        let count = connected.len();
        *self.servers.write().expect("servers lock") = connected;
        *self.init_warnings.write().expect("warnings lock") = warnings;
        Ok(count)
    }

    /// Warnings collected during `initialize` (unreachable servers, failed
    /// discovery), for mirroring into a run's session log.
    pub fn initialization_warnings(&self) -> Vec<String> {
        self.init_warnings.read().expect("warnings lock").clone()
    }

    /// The flat catalog across all connected servers.
    pub fn catalog(&self) -> Vec<ToolSpec> {
        self.servers
            .read()
            .expect("servers lock")
            .iter()
            .flat_map(|s| s.tools.iter().cloned())
            .collect()
    }

    /// The permission table this broker gates with.
    pub fn permissions(&self) -> &AgentPermissions {
        &self.permissions
    }

    /// Structured catalog view grouped by server, with each tool's schema.
    pub fn tools_info(&self) -> CatalogSummary {
        let servers = self.servers.read().expect("servers lock");
        let mut grouped: BTreeMap<String, ServerToolsInfo> = BTreeMap::new();
        let mut total_tools = 0usize;

        for server in servers.iter() {
            for tool in &server.tools {
                let group = server_group(&server.name, &tool.name);
                let entry = grouped
                    .entry(group.clone())
                    .or_insert_with(|| ServerToolsInfo {
                        name: group,
                        tools: Vec::new(),
                        tool_count: 0,
                    });
                entry.tools.push(ToolInfo::from_spec(tool));
                entry.tool_count += 1;
                total_tools += 1;
            }
        }

        CatalogSummary {
            server_count: grouped.len(),
            servers: grouped,
            total_tools,
            agent_permissions: self.permissions.as_map().clone(),
        }
    }

    fn server_for_tool(&self, tool_name: &str) -> Option<Arc<McpServer>> {
        self.servers
            .read()
            .expect("servers lock")
            .iter()
            .find(|s| s.tools.iter().any(|t| t.name == tool_name))
            .cloned()
    }

    /// Releases all server handles (kills stdio children, drops HTTP clients).
    pub async fn close(&self) {
        let servers = {
            let mut guard = self.servers.write().expect("servers lock");
            std::mem::take(&mut *guard)
        };
        for server in servers {
            if let McpServerSession::Stdio(mutex) = &server.session {
                mutex.lock().await.shutdown().await;
            }
        }
        info!("MCP broker closed");
    }
}

#[async_trait]
impl ToolBroker for McpToolBroker {
    fn tools_for_agent(&self, agent_name: &str) -> Vec<ToolSpec> {
        if !self.permissions.is_enabled(agent_name) {
            return Vec::new();
        }
        self.catalog()
    }

    async fn call_tool_for_agent(&self, agent_name: &str, tool_name: &str, args: Value) -> Value {
        if !self.permissions.is_enabled(agent_name) {
            let msg = format!("agent {agent_name} is not authorized to use MCP tools");
            warn!(agent = %agent_name, tool = %tool_name, "permission denied");
            return serde_json::json!({"error": msg});
        }

        let Some(server) = self.server_for_tool(tool_name) else {
            let msg = format!("tool not found: {tool_name}");
            warn!(agent = %agent_name, tool = %tool_name, "unknown tool");
            return serde_json::json!({"error": msg});
        };

        let result = match &server.session {
            McpServerSession::Http(http) => http.call_tool(tool_name, args).await,
            McpServerSession::Stdio(mutex) => mutex.lock().await.call_tool(tool_name, args).await,
        };

        match result {
            Ok(value) => value,
            Err(e) => {
                warn!(agent = %agent_name, tool = %tool_name, error = %e, "tool call failed");
                serde_json::json!({"error": e.to_string()})
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.into(),
            description: Some(format!("{name} tool")),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {"symbol": {"type": "string"}},
                "required": ["symbol"]
            }),
        }
    }

    fn server(name: &str, tools: Vec<ToolSpec>) -> Arc<McpServer> {
        Arc::new(McpServer {
            name: name.into(),
            session: McpServerSession::Http(McpHttpSession::disconnected("http://test.invalid")),
            tools,
        })
    }

    fn broker_with_tools(permissions: AgentPermissions, tools: Vec<ToolSpec>) -> McpToolBroker {
        let broker = McpToolBroker::new(permissions);
        broker.servers.write().unwrap().push(server("finance", tools));
        broker
    }

    /// **Scenario**: A permitted agent sees the whole catalog; others see nothing.
    #[test]
    fn tools_for_agent_gates_by_permission() {
        let broker = broker_with_tools(
            AgentPermissions::enable_only(["market_analyst"]),
            vec![spec("get_quote"), spec("get_news")],
        );
        assert_eq!(broker.tools_for_agent("market_analyst").len(), 2);
        assert!(broker.tools_for_agent("news_analyst").is_empty());
    }

    /// **Scenario**: Permission denial returns a structured error payload.
    #[tokio::test]
    async fn call_tool_denied_returns_error_payload() {
        let broker = broker_with_tools(
            AgentPermissions::enable_only(["market_analyst"]),
            vec![spec("get_quote")],
        );
        let result = broker
            .call_tool_for_agent("trader", "get_quote", serde_json::json!({}))
            .await;
        let msg = result["error"].as_str().unwrap();
        assert!(msg.contains("not authorized"), "{msg}");
    }

    /// **Scenario**: An unknown tool returns a not-found error payload.
    #[tokio::test]
    async fn call_tool_unknown_returns_error_payload() {
        let broker = broker_with_tools(
            AgentPermissions::enable_only(["market_analyst"]),
            vec![spec("get_quote")],
        );
        let result = broker
            .call_tool_for_agent("market_analyst", "missing_tool", serde_json::json!({}))
            .await;
        let msg = result["error"].as_str().unwrap();
        assert!(msg.contains("tool not found"), "{msg}");
    }

    /// **Scenario**: tools_info groups by server with schema-derived parameters.
    #[test]
    fn tools_info_groups_by_server() {
        let broker = broker_with_tools(
            AgentPermissions::enable_only(["market_analyst"]),
            vec![spec("get_quote"), spec("get_news")],
        );
        let info = broker.tools_info();
        assert_eq!(info.total_tools, 2);
        assert_eq!(info.server_count, 1);
        let finance = &info.servers["finance"];
        assert_eq!(finance.tool_count, 2);
        assert_eq!(finance.tools[0].required, vec!["symbol".to_string()]);
        assert!(info.agent_permissions["market_analyst"]);
    }

    /// **Scenario**: Unattributed tools are grouped by the name heuristic.
    #[test]
    fn server_group_heuristic_buckets_unattributed_tools() {
        assert_eq!(server_group("finance", "anything"), "finance");
        assert_eq!(server_group("", "get_stock_price"), "finance-data-server");
        assert_eq!(server_group("", "finance_overview"), "finance-data-server");
        assert_eq!(server_group("", "get_weather"), "default");
    }

    /// **Scenario**: An uninitialized broker has an empty catalog and no warnings.
    #[test]
    fn empty_broker_has_no_tools() {
        let broker = McpToolBroker::new(AgentPermissions::enable_only(["market_analyst"]));
        assert!(broker.catalog().is_empty());
        assert!(broker.tools_for_agent("market_analyst").is_empty());
        assert!(broker.initialization_warnings().is_empty());
    }

    /// **Scenario**: initialize records a warning for an unreachable server and
    /// still succeeds with zero connected servers.
    #[tokio::test]
    async fn initialize_degrades_on_unreachable_server() {
        let broker = McpToolBroker::new(AgentPermissions::default());
        let config: McpConfig = serde_json::from_value(serde_json::json!({
            "servers": {
                "down": {"url": "http://127.0.0.1:1/mcp", "transport": "http", "timeout": 1}
            }
        }))
        .unwrap();
        let connected = broker.initialize(&config).await.unwrap();
        assert_eq!(connected, 0);
        let warnings = broker.initialization_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("unreachable"), "{}", warnings[0]);
    }

    /// **Scenario**: Duplicate tool names across servers are a configuration error.
    #[test]
    fn duplicate_tool_names_detected() {
        let servers = vec![
            server("a", vec![spec("get_quote")]),
            server("b", vec![spec("get_quote")]),
        ];
        match check_duplicate_tools(&servers) {
            Err(ToolSourceError::DuplicateTool { name, first, second }) => {
                assert_eq!(name, "get_quote");
                assert_eq!((first.as_str(), second.as_str()), ("a", "b"));
            }
            other => panic!("expected DuplicateTool, got {other:?}"),
        }
    }

    /// **Scenario**: Distinct tool names across servers pass the check.
    #[test]
    fn distinct_tool_names_pass_check() {
        let servers = vec![
            server("a", vec![spec("get_quote")]),
            server("b", vec![spec("get_news")]),
        ];
        assert!(check_duplicate_tools(&servers).is_ok());
    }
}
