//! Orchestrator facade: one entry point that wires recorder, broker, LLM and
//! graph together for a single analysis run.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::agent::AgentContext;
use crate::config::{McpConfig, Settings};
use crate::llm::{ChatOpenAI, LlmClient};
use crate::mcp::{CatalogSummary, McpToolBroker, ToolSourceError};
use crate::recorder::{RecorderError, SessionRecorder, SessionStatus};
use crate::state::AnalysisState;

use super::{build_workflow, catalog_roles, WorkflowOptions};

/// Diagnostics view over the configured workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowInfo {
    pub agents_count: usize,
    pub max_debate_rounds: u32,
    pub max_risk_debate_rounds: u32,
    pub debug_mode: bool,
    pub verbose_logging: bool,
    pub mcp_tools_info: CatalogSummary,
    pub agents_info: BTreeMap<String, AgentInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub role_description: String,
    pub mcp_enabled: bool,
}

/// The orchestrator facade.
///
/// Construct once, `initialize()` the broker (failure is non-fatal: the run
/// proceeds in no-tool mode), then `run_analysis` any number of times. Call
/// `close()` when done to release the MCP server handles.
pub struct Orchestrator {
    settings: Settings,
    mcp_config: McpConfig,
    broker: Arc<McpToolBroker>,
    llm: Arc<dyn LlmClient>,
    options: WorkflowOptions,
}

impl Orchestrator {
    /// Builds the orchestrator with an OpenAI-compatible LLM client from the
    /// configured settings.
    pub fn new(settings: Settings, mcp_config: McpConfig) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(settings.llm.api_key.clone())
            .with_api_base(settings.llm.base_url.clone());
        let llm = ChatOpenAI::with_config(config, settings.llm.model.clone())
            .with_temperature(settings.llm.temperature)
            .with_max_tokens(settings.llm.max_tokens);
        Self::with_llm(settings, mcp_config, Arc::new(llm))
    }

    /// Builds the orchestrator around an injected LLM client (tests, stubs).
    pub fn with_llm(settings: Settings, mcp_config: McpConfig, llm: Arc<dyn LlmClient>) -> Self {
        let broker = Arc::new(McpToolBroker::new(settings.permissions.clone()));
        let options = WorkflowOptions::from(&settings.workflow);
        Self {
            settings,
            mcp_config,
            broker,
            llm,
            options,
        }
    }

    /// Overrides the workflow shape (extended analysts, custom bounds).
    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    /// Connects the MCP servers. Returns whether any server is usable; an
    /// unreachable server is downgraded to a warning. A duplicate tool name
    /// across servers is a configuration error and is returned as `Err`.
    pub async fn initialize(&self) -> Result<bool, ToolSourceError> {
        let connected = self.broker.initialize(&self.mcp_config).await?;
        if connected == 0 {
            info!("no MCP servers available, running in no-tool mode");
        }
        Ok(connected > 0)
    }

    /// Runs one complete analysis.
    ///
    /// Blocking from the caller's view; cancellable through `cancel`. Always
    /// returns the (possibly partial) analysis state; the only error is a
    /// failure to create the session log file.
    pub async fn run_analysis(
        &self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<AnalysisState, RecorderError> {
        info!(query = %query, "analysis started");
        let recorder = Arc::new(SessionRecorder::new(&self.settings.dump_dir, None)?);
        recorder.set_user_query(query);
        recorder.set_status(SessionStatus::Running);

        let mut state = AnalysisState::new(query);
        for warning in self.broker.initialization_warnings() {
            state.add_warning(warning.clone());
            recorder.add_warning(&warning, None);
        }

        let ctx = Arc::new(AgentContext {
            llm: self.llm.clone(),
            broker: self.broker.clone(),
            recorder: recorder.clone(),
            cancel: cancel.clone(),
        });

        let graph = match build_workflow(ctx, &self.options) {
            Ok(g) => g,
            Err(e) => {
                let msg = format!("workflow build failed: {e}");
                error!(error = %e, "workflow build failed");
                state.add_error(msg.clone());
                recorder.add_error(&msg, None);
                recorder.set_status(SessionStatus::Failed);
                return Ok(state);
            }
        };

        let mut final_state = match graph.invoke(state.clone(), &cancel).await {
            Ok(s) => s,
            Err(e) => {
                let msg = format!("workflow execution failed: {e}");
                error!(error = %e, "workflow execution failed");
                state.add_error(msg.clone());
                recorder.add_error(&msg, None);
                recorder.set_status(SessionStatus::Failed);
                return Ok(state);
            }
        };

        if cancel.is_cancelled() {
            let msg = "analysis cancelled by caller";
            final_state.add_warning(msg);
            recorder.add_warning(msg, None);
            recorder.set_status(SessionStatus::Cancelled);
            info!("analysis cancelled");
        } else {
            recorder.set_final_results(final_results(&final_state));
            recorder.set_status(SessionStatus::Completed);
            info!("analysis completed");
        }

        if self.settings.workflow.verbose_logging {
            log_analysis_summary(&final_state);
        }

        Ok(final_state)
    }

    /// Diagnostics: agent catalog, debate bounds, flags and the tool catalog.
    pub fn workflow_info(&self) -> WorkflowInfo {
        let agents_info = catalog_roles()
            .into_iter()
            .map(|role| {
                (
                    role.name().to_string(),
                    AgentInfo {
                        name: role.name().to_string(),
                        role_description: role.role_description().to_string(),
                        mcp_enabled: self.settings.permissions.is_enabled(role.name()),
                    },
                )
            })
            .collect();
        WorkflowInfo {
            agents_count: catalog_roles().len(),
            max_debate_rounds: self.options.max_debate_rounds,
            max_risk_debate_rounds: self.options.max_risk_debate_rounds,
            debug_mode: self.settings.workflow.debug_mode,
            verbose_logging: self.settings.workflow.verbose_logging,
            mcp_tools_info: self.broker.tools_info(),
            agents_info,
        }
    }

    /// The per-agent MCP permission table.
    pub fn agent_permissions(&self) -> &BTreeMap<String, bool> {
        self.settings.permissions.as_map()
    }

    /// Agents with MCP enabled.
    pub fn enabled_agents(&self) -> Vec<String> {
        self.settings.permissions.enabled_agents()
    }

    /// Releases MCP server handles.
    pub async fn close(&self) {
        self.broker.close().await;
        info!("orchestrator closed");
    }
}

/// The final-results mirror stored in the session log.
fn final_results(state: &AnalysisState) -> serde_json::Value {
    json!({
        "final_state": serde_json::to_value(state).unwrap_or_default(),
        "completion_time": chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        "success": true,
    })
}

/// Post-run execution statistics, logged when verbose logging is on.
fn log_analysis_summary(state: &AnalysisState) {
    let mcp_used = state
        .agent_execution_history
        .iter()
        .filter(|h| h.mcp_used)
        .count();
    info!(
        user_query = %state.user_query,
        agent_executions = state.agent_execution_history.len(),
        executions_with_mcp = mcp_used,
        mcp_tool_calls = state.mcp_tool_calls.len(),
        investment_debate_rounds = state.investment_debate_state.count,
        risk_debate_rounds = state.risk_debate_state.count,
        errors = state.errors.len(),
        warnings = state.warnings.len(),
        "analysis summary"
    );
    for error in &state.errors {
        error!(message = %error, "analysis error");
    }
    for warning in &state.warnings {
        tracing::warn!(message = %warning, "analysis warning");
    }
}
