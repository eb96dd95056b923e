//! Mock tool broker for tests.
//!
//! Serves a fixed catalog and a canned result for every call, with optional
//! per-agent gating. Calls are recorded so tests can assert on routing.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{ToolBroker, ToolSpec};

/// One recorded call: (agent, tool, args).
pub type RecordedCall = (String, String, Value);

/// Mock broker: fixed catalog, canned result, recorded calls.
///
/// By default every agent is permitted; restrict with `with_enabled_agents`.
pub struct MockToolBroker {
    tools: Vec<ToolSpec>,
    result: Value,
    enabled: Option<HashSet<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockToolBroker {
    /// Creates a broker serving `tools` and answering every call with `result`.
    pub fn new(tools: Vec<ToolSpec>, result: Value) -> Self {
        Self {
            tools,
            result,
            enabled: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Creates a broker with no tools at all (no-tool mode).
    pub fn empty() -> Self {
        Self::new(Vec::new(), Value::Null)
    }

    /// Restricts the catalog to the listed agents; others see no tools.
    pub fn with_enabled_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = Some(agents.into_iter().map(Into::into).collect());
        self
    }

    fn agent_enabled(&self, agent_name: &str) -> bool {
        match &self.enabled {
            Some(set) => set.contains(agent_name),
            None => true,
        }
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ToolBroker for MockToolBroker {
    fn tools_for_agent(&self, agent_name: &str) -> Vec<ToolSpec> {
        if !self.agent_enabled(agent_name) {
            return Vec::new();
        }
        self.tools.clone()
    }

    async fn call_tool_for_agent(&self, agent_name: &str, tool_name: &str, args: Value) -> Value {
        self.calls.lock().expect("calls lock").push((
            agent_name.to_string(),
            tool_name.to_string(),
            args,
        ));
        if !self.agent_enabled(agent_name) {
            return serde_json::json!({
                "error": format!("agent {agent_name} is not authorized to use MCP tools")
            });
        }
        self.result.clone()
    }
}
