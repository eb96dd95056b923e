//! Analysis state: the single record threaded through every workflow node.
//!
//! One `AnalysisState` flows through the graph; each agent reads the fields it
//! depends on and writes exactly one designated output. Report and plan fields
//! are write-once: the typed setter refuses a second write so authorship stays
//! with a single agent for the whole run. The two debate substates are
//! append-only transcripts with per-side histories, a last-response slot per
//! participant, and a round counter that routing reads.

mod debate;

pub use debate::{DebateSide, InvestmentDebateState, RiskDebateState, RiskStance};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timestamp format used in execution history entries.
const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The write-once output fields of the analysis state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    CompanyOverviewReport,
    MarketReport,
    SentimentReport,
    NewsReport,
    FundamentalsReport,
    ShareholderReport,
    ProductReport,
    InvestmentPlan,
    TraderInvestmentPlan,
    FinalTradeDecision,
}

impl ReportField {
    /// Field name as it appears in the serialized state and session log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CompanyOverviewReport => "company_overview_report",
            Self::MarketReport => "market_report",
            Self::SentimentReport => "sentiment_report",
            Self::NewsReport => "news_report",
            Self::FundamentalsReport => "fundamentals_report",
            Self::ShareholderReport => "shareholder_report",
            Self::ProductReport => "product_report",
            Self::InvestmentPlan => "investment_plan",
            Self::TraderInvestmentPlan => "trader_investment_plan",
            Self::FinalTradeDecision => "final_trade_decision",
        }
    }
}

impl std::fmt::Display for ReportField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error from a state mutation that violates an authorship invariant.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The field already holds a non-empty value; it is read-only for the rest of the run.
    #[error("field {0} was already written")]
    AlreadyWritten(ReportField),
}

/// One agent execution record (observability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    pub agent_name: String,
    pub action: String,
    pub result: String,
    pub mcp_used: bool,
    pub timestamp: String,
}

/// One MCP tool call record (observability).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolCall {
    pub agent_name: String,
    pub tool_name: String,
    pub tool_args: Value,
    pub tool_result: Value,
    pub timestamp: String,
}

/// The shared analysis state threaded through all workflow nodes.
///
/// **Authorship**: every report/plan field is written by exactly one agent via
/// [`AnalysisState::write_report`]; once non-empty it is read-only.
/// `final_trade_decision` is written exactly once, at the terminal node. On an
/// agent failure the designated field holds a readable error message and an
/// entry lands in `errors`; the run proceeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisState {
    /// The user's analysis question. Non-empty for a valid run.
    pub user_query: String,

    // Analyst reports, one author each.
    pub company_overview_report: String,
    pub market_report: String,
    pub sentiment_report: String,
    pub news_report: String,
    pub fundamentals_report: String,
    pub shareholder_report: String,
    pub product_report: String,

    /// Bull vs bear debate substate.
    pub investment_debate_state: InvestmentDebateState,
    /// Research manager decision.
    pub investment_plan: String,

    /// Trader execution plan.
    pub trader_investment_plan: String,

    /// Three-way risk debate substate.
    pub risk_debate_state: RiskDebateState,
    /// Final decision, written by the risk manager at the terminal node.
    pub final_trade_decision: String,

    /// Ordered observability trails.
    pub agent_execution_history: Vec<AgentExecution>,
    pub mcp_tool_calls: Vec<McpToolCall>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl AnalysisState {
    /// Creates a fresh state for one analysis run.
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Self::default()
        }
    }

    fn field_mut(&mut self, field: ReportField) -> &mut String {
        match field {
            ReportField::CompanyOverviewReport => &mut self.company_overview_report,
            ReportField::MarketReport => &mut self.market_report,
            ReportField::SentimentReport => &mut self.sentiment_report,
            ReportField::NewsReport => &mut self.news_report,
            ReportField::FundamentalsReport => &mut self.fundamentals_report,
            ReportField::ShareholderReport => &mut self.shareholder_report,
            ReportField::ProductReport => &mut self.product_report,
            ReportField::InvestmentPlan => &mut self.investment_plan,
            ReportField::TraderInvestmentPlan => &mut self.trader_investment_plan,
            ReportField::FinalTradeDecision => &mut self.final_trade_decision,
        }
    }

    /// Returns the current value of a write-once field.
    pub fn report(&self, field: ReportField) -> &str {
        match field {
            ReportField::CompanyOverviewReport => &self.company_overview_report,
            ReportField::MarketReport => &self.market_report,
            ReportField::SentimentReport => &self.sentiment_report,
            ReportField::NewsReport => &self.news_report,
            ReportField::FundamentalsReport => &self.fundamentals_report,
            ReportField::ShareholderReport => &self.shareholder_report,
            ReportField::ProductReport => &self.product_report,
            ReportField::InvestmentPlan => &self.investment_plan,
            ReportField::TraderInvestmentPlan => &self.trader_investment_plan,
            ReportField::FinalTradeDecision => &self.final_trade_decision,
        }
    }

    /// Writes a report/plan field, enforcing the once-written invariant.
    pub fn write_report(&mut self, field: ReportField, value: String) -> Result<(), StateError> {
        let slot = self.field_mut(field);
        if !slot.is_empty() {
            return Err(StateError::AlreadyWritten(field));
        }
        *slot = value;
        Ok(())
    }

    /// All analyst reports in catalog order with their field labels.
    pub fn all_reports(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("company_overview_report", self.company_overview_report.as_str()),
            ("market_report", self.market_report.as_str()),
            ("sentiment_report", self.sentiment_report.as_str()),
            ("news_report", self.news_report.as_str()),
            ("fundamentals_report", self.fundamentals_report.as_str()),
            ("shareholder_report", self.shareholder_report.as_str()),
            ("product_report", self.product_report.as_str()),
        ]
    }

    /// Combined debate transcript for context prompts; empty when no debate ran.
    pub fn debate_summary(&self) -> String {
        let mut summary = String::new();
        if !self.investment_debate_state.history.is_empty() {
            summary.push_str("Investment debate history:\n");
            summary.push_str(&self.investment_debate_state.history);
            summary.push_str("\n\n");
        }
        if !self.risk_debate_state.history.is_empty() {
            summary.push_str("Risk debate history:\n");
            summary.push_str(&self.risk_debate_state.history);
            summary.push_str("\n\n");
        }
        summary.trim().to_string()
    }

    /// Appends an agent execution record.
    pub fn add_agent_execution(
        &mut self,
        agent_name: impl Into<String>,
        action: impl Into<String>,
        result: impl Into<String>,
        mcp_used: bool,
    ) {
        self.agent_execution_history.push(AgentExecution {
            agent_name: agent_name.into(),
            action: action.into(),
            result: result.into(),
            mcp_used,
            timestamp: chrono::Local::now().format(HISTORY_TIME_FORMAT).to_string(),
        });
    }

    /// Appends an MCP tool call record.
    pub fn add_mcp_tool_call(
        &mut self,
        agent_name: impl Into<String>,
        tool_name: impl Into<String>,
        tool_args: Value,
        tool_result: Value,
    ) {
        self.mcp_tool_calls.push(McpToolCall {
            agent_name: agent_name.into(),
            tool_name: tool_name.into(),
            tool_args,
            tool_result,
            timestamp: chrono::Local::now().format(HISTORY_TIME_FORMAT).to_string(),
        });
    }

    /// Appends an error message.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Appends a warning message.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: A report field accepts exactly one write; the second fails.
    #[test]
    fn write_report_enforces_once_written() {
        let mut state = AnalysisState::new("analyze AAPL");
        state
            .write_report(ReportField::MarketReport, "report one".into())
            .expect("first write succeeds");
        let err = state
            .write_report(ReportField::MarketReport, "report two".into())
            .unwrap_err();
        assert!(matches!(err, StateError::AlreadyWritten(ReportField::MarketReport)));
        assert_eq!(state.market_report, "report one");
    }

    /// **Scenario**: final_trade_decision goes through the same once-written gate.
    #[test]
    fn final_trade_decision_written_once() {
        let mut state = AnalysisState::new("q");
        state
            .write_report(ReportField::FinalTradeDecision, "approve".into())
            .unwrap();
        assert!(state
            .write_report(ReportField::FinalTradeDecision, "reject".into())
            .is_err());
        assert_eq!(state.final_trade_decision, "approve");
    }

    /// **Scenario**: debate_summary combines both transcripts and trims.
    #[test]
    fn debate_summary_combines_histories() {
        let mut state = AnalysisState::new("q");
        assert!(state.debate_summary().is_empty());

        state
            .investment_debate_state
            .record_turn(DebateSide::Bull, "bull case".into());
        let s = state.debate_summary();
        assert!(s.starts_with("Investment debate history:"));
        assert!(s.contains("bull case"));
        assert!(!s.contains("Risk debate history:"));

        state
            .risk_debate_state
            .record_turn(RiskStance::Aggressive, "risk take".into());
        let s = state.debate_summary();
        assert!(s.contains("Risk debate history:"));
        assert!(s.contains("risk take"));
    }

    /// **Scenario**: execution and tool call records append in order with timestamps.
    #[test]
    fn observability_trails_append_in_order() {
        let mut state = AnalysisState::new("q");
        state.add_agent_execution("market_analyst", "llm_call", "ok", false);
        state.add_agent_execution("news_analyst", "llm_call", "ok", true);
        state.add_mcp_tool_call(
            "market_analyst",
            "get_quote",
            serde_json::json!({"symbol": "AAPL"}),
            serde_json::json!("180"),
        );

        assert_eq!(state.agent_execution_history.len(), 2);
        assert_eq!(state.agent_execution_history[0].agent_name, "market_analyst");
        assert_eq!(state.agent_execution_history[1].agent_name, "news_analyst");
        assert!(state.agent_execution_history[1].mcp_used);
        assert_eq!(state.mcp_tool_calls.len(), 1);
        assert!(!state.mcp_tool_calls[0].timestamp.is_empty());
    }

    /// **Scenario**: The state round-trips through serde with debate substates.
    #[test]
    fn state_serde_roundtrip() {
        let mut state = AnalysisState::new("analyze AAPL");
        state
            .write_report(ReportField::MarketReport, "bullish".into())
            .unwrap();
        state
            .investment_debate_state
            .record_turn(DebateSide::Bull, "opening".into());

        let json = serde_json::to_string(&state).unwrap();
        let back: AnalysisState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.user_query, "analyze AAPL");
        assert_eq!(back.market_report, "bullish");
        assert_eq!(back.investment_debate_state.count, 1);
    }
}
