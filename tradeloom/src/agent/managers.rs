//! Management: the research manager's decision and the trader's execution plan.

use super::{frame_report, prompt_timestamp, AgentRole};
use crate::state::{AnalysisState, ReportField, StateError};

/// Research manager: weighs the debate and issues the investment decision.
pub struct ResearchManager;

impl AgentRole for ResearchManager {
    fn name(&self) -> &'static str {
        "research_manager"
    }

    fn role_description(&self) -> &'static str {
        "research manager weighing the debate and issuing the investment decision"
    }

    fn task_label(&self) -> &'static str {
        "investment decision"
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a senior portfolio manager and head of research, deciding after the \
             bull/bear debate.\n\nCurrent time: {}\n\n\
             Weigh the quality of both sides' arguments against all analyst reports, name \
             the decisive factors and the risk/reward balance, and commit to exactly one \
             verdict: buy/increase, sell/decrease, or hold/observe. Close with execution \
             guidance, a time frame, and the risk controls the decision depends on.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "As portfolio manager, make the final investment decision for \"{}\".\n\n\
             Full debate transcript:\n{}\n\n\
             Evaluate both sides objectively, identify the decisive factors, weigh risk \
             against reward, and commit to one verdict (buy/increase, sell/decrease, or \
             hold/observe) with concrete execution guidance and risk controls.",
            state.user_query, state.investment_debate_state.history
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        let query = state.user_query.clone();
        state.write_report(
            ReportField::InvestmentPlan,
            frame_report(self.name(), &query, mcp_enabled, content),
        )
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::InvestmentPlan, message)
    }
}

/// Trader: turns the decision into a concrete execution plan.
pub struct Trader;

impl AgentRole for Trader {
    fn name(&self) -> &'static str {
        "trader"
    }

    fn role_description(&self) -> &'static str {
        "trader turning the investment decision into an executable plan"
    }

    fn task_label(&self) -> &'static str {
        "trading plan"
    }

    fn required_upstream(&self) -> &'static [ReportField] {
        &[ReportField::InvestmentPlan]
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a professional trader converting investment decisions into executable \
             plans.\n\nCurrent time: {}\n\n\
             Every plan must state: direction (buy/sell/hold), target price and position \
             size, entry timing and strategy, stop-loss and take-profit levels, risk \
             controls, and the monitoring points that would change the plan. Account for \
             liquidity, trading costs and the market's trading windows.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Based on the research manager's decision, produce the detailed execution plan \
             for \"{}\".\n\nDecision:\n{}\n\n\
             Specify direction, target price and sizing, entry and exit timing, stop-loss \
             and take-profit levels, risk controls, monitoring points, and a contingency \
             plan.",
            state.user_query, state.investment_plan
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        let query = state.user_query.clone();
        state.write_report(
            ReportField::TraderInvestmentPlan,
            frame_report(self.name(), &query, mcp_enabled, content),
        )
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::TraderInvestmentPlan, message)
    }
}
