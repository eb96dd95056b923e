//! Agent harness and catalog.
//!
//! Every agent is a prompt specialization with a single designated output
//! field; the shared harness ([`AgentNode`]) owns the rest: precondition
//! checks, prompt assembly, the LLM call (tool rounds included), session-log
//! bracketing, state mirroring and error capture. No exception crosses the
//! harness boundary: failures become state data and the run proceeds.

mod analysts;
mod managers;
mod researchers;
mod risk;

pub use analysts::{
    CompanyOverviewAnalyst, FundamentalsAnalyst, MarketAnalyst, NewsAnalyst, ProductAnalyst,
    SentimentAnalyst, ShareholderAnalyst,
};
pub use managers::{ResearchManager, Trader};
pub use researchers::{BearResearcher, BullResearcher};
pub use risk::{AggressiveRiskAnalyst, NeutralRiskAnalyst, RiskManager, SafeRiskAnalyst};

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::llm::{chat_with_tools, LlmClient};
use crate::mcp::ToolBroker;
use crate::recorder::SessionRecorder;
use crate::state::{AnalysisState, ReportField, StateError};

/// Shared per-run dependencies handed to every agent node.
pub struct AgentContext {
    pub llm: Arc<dyn LlmClient>,
    pub broker: Arc<dyn ToolBroker>,
    pub recorder: Arc<SessionRecorder>,
    pub cancel: CancellationToken,
}

/// One agent's specialization: identity, prompts, and the state field it owns.
///
/// Implementations are small: a name, a system prompt template, the request
/// built from state, and `apply`/`apply_error` that write the designated
/// output. Everything else lives in the harness.
pub trait AgentRole: Send + Sync {
    /// Node id and catalog name (e.g. `"market_analyst"`).
    fn name(&self) -> &'static str;

    /// One-line role description for diagnostics.
    fn role_description(&self) -> &'static str;

    /// Short task label, used for the recorder action and error prefixes
    /// (e.g. `"market analysis"`).
    fn task_label(&self) -> &'static str;

    /// Upstream fields this agent expects; missing ones are warned about but
    /// do not stop the run.
    fn required_upstream(&self) -> &'static [ReportField] {
        &[]
    }

    /// The role's system prompt (includes the current timestamp).
    fn system_prompt(&self, state: &AnalysisState) -> String;

    /// The user request for this turn, built from state.
    fn request(&self, state: &AnalysisState) -> String;

    /// Writes the successful result into the agent's designated state field.
    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError>;

    /// Writes the failure message into the agent's designated field. Debate
    /// participants record it as their turn so the round counter still
    /// advances.
    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError>;
}

/// Timestamp line used in prompts.
pub(crate) fn prompt_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S (%A)").to_string()
}

/// Frames an agent's output the way reports are stored and exported.
pub(crate) fn frame_report(
    agent_name: &str,
    user_query: &str,
    mcp_enabled: bool,
    content: &str,
) -> String {
    format!(
        "=== {} analysis report ===\n\
         time: {}\n\
         user query: {}\n\
         MCP tools: {}\n\n\
         {}\n\n\
         === end of report ===",
        agent_name,
        chrono::Local::now().format("%Y%m%d %H:%M:%S"),
        user_query,
        if mcp_enabled { "enabled" } else { "disabled" },
        content
    )
}

/// Builds the context prompt in fixed order: timestamp, user query, every
/// non-empty report, debate summary, manager decision, trader plan. Omitted
/// sections collapse to nothing.
pub fn build_context_prompt(state: &AnalysisState) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.push(format!("Current date and time: {}", prompt_timestamp()));
    parts.push(format!("User query: {}", state.user_query));

    for (label, content) in state.all_reports() {
        if !content.trim().is_empty() {
            parts.push(format!("{label}: {content}"));
        }
    }

    let debate = state.debate_summary();
    if !debate.is_empty() {
        parts.push(format!("Debate history:\n{debate}"));
    }
    if !state.investment_plan.is_empty() {
        parts.push(format!(
            "Research manager decision: {}",
            state.investment_plan
        ));
    }
    if !state.trader_investment_plan.is_empty() {
        parts.push(format!("Trader plan: {}", state.trader_investment_plan));
    }

    parts.join("\n\n")
}

/// The agent harness: wraps an [`AgentRole`] as a graph node.
pub struct AgentNode {
    role: Arc<dyn AgentRole>,
    ctx: Arc<AgentContext>,
    /// Optional stage marker opened when this node starts.
    stage: Option<(&'static str, &'static str)>,
}

impl AgentNode {
    pub fn new(role: Arc<dyn AgentRole>, ctx: Arc<AgentContext>) -> Self {
        Self {
            role,
            ctx,
            stage: None,
        }
    }

    /// Opens the named stage in the session log when this node starts.
    pub fn with_stage(mut self, stage_name: &'static str, description: &'static str) -> Self {
        self.stage = Some((stage_name, description));
        self
    }
}

#[async_trait]
impl Node<AnalysisState> for AgentNode {
    fn id(&self) -> &str {
        self.role.name()
    }

    async fn run(&self, mut state: AnalysisState) -> Result<(AnalysisState, Next), AgentError> {
        let name = self.role.name();

        if let Some((stage_name, description)) = self.stage {
            self.ctx.recorder.start_stage(stage_name, description);
        }

        if state.user_query.trim().is_empty() {
            let msg = format!("{name}: missing user query");
            warn!(agent = %name, "missing user query");
            state.add_error(msg.clone());
            self.ctx.recorder.add_error(&msg, Some(name));
            return Ok((state, Next::Continue));
        }
        for field in self.role.required_upstream() {
            if state.report(*field).is_empty() {
                let msg = format!("{name}: upstream field {field} is empty");
                warn!(agent = %name, field = %field, "missing upstream field");
                state.add_warning(msg);
            }
        }

        let system_prompt = self.role.system_prompt(&state);
        let context_prompt = build_context_prompt(&state);
        let user_request = self.role.request(&state);
        let system_level = format!("{system_prompt}\n\n{context_prompt}");

        let tools = self.ctx.broker.tools_for_agent(name);
        let tools_enabled = !tools.is_empty();

        info!(agent = %name, tools_enabled, tool_count = tools.len(), "agent started");
        self.ctx.recorder.start_agent(
            name,
            self.role.task_label(),
            &system_prompt,
            &user_request,
            &context_prompt,
        );
        self.ctx.recorder.add_agent_action(
            name,
            "llm_call",
            serde_json::json!({
                "tools_enabled": tools_enabled,
                "tool_count": tools.len(),
            }),
        );

        let result = chat_with_tools(
            self.ctx.llm.as_ref(),
            self.ctx.broker.as_ref(),
            &self.ctx.recorder,
            name,
            system_level,
            &[],
            user_request,
            tools,
            &self.ctx.cancel,
        )
        .await;

        match result {
            Ok(outcome) => {
                for exchange in &outcome.tool_calls {
                    state.add_mcp_tool_call(
                        name,
                        exchange.tool_name.clone(),
                        exchange.arguments.clone(),
                        exchange.result.clone(),
                    );
                }
                if outcome.rounds_exhausted {
                    let msg =
                        format!("{name}: tool round limit reached, answer may be incomplete");
                    state.add_warning(msg.clone());
                    self.ctx.recorder.add_warning(&msg, Some(name));
                }

                if outcome.cancelled && outcome.content.is_empty() {
                    // Nothing was produced before the cancel; keep the field
                    // untouched and close the record.
                    self.ctx.recorder.complete_agent(name, "", false);
                    info!(agent = %name, "agent cancelled before producing output");
                    return Ok((state, Next::Continue));
                }

                if let Err(e) = self.role.apply(&mut state, &outcome.content, tools_enabled) {
                    let msg = format!("{name}: {e}");
                    warn!(agent = %name, error = %e, "state write rejected");
                    state.add_warning(msg.clone());
                    self.ctx.recorder.add_warning(&msg, Some(name));
                }
                let action_label = if tools_enabled {
                    "LLM call (with MCP tools)"
                } else {
                    "LLM call (no tools)"
                };
                state.add_agent_execution(name, action_label, outcome.content.as_str(), tools_enabled);
                self.ctx.recorder.complete_agent(name, &outcome.content, true);
                info!(
                    agent = %name,
                    result_chars = outcome.content.len(),
                    tool_rounds = outcome.tool_rounds,
                    "agent completed"
                );
            }
            Err(e) => {
                let message = format!("{} error: {}", self.role.task_label(), e);
                warn!(agent = %name, error = %e, "agent failed");
                if let Err(werr) = self.role.apply_error(&mut state, message.clone()) {
                    state.add_warning(format!("{name}: {werr}"));
                }
                state.add_error(format!("{name}: {e}"));
                self.ctx.recorder.add_error(&format!("{name}: {e}"), Some(name));
                self.ctx.recorder.complete_agent(name, &message, false);
            }
        }

        Ok((state, Next::Continue))
    }
}
