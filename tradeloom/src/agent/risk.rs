//! Risk management: the three-way risk debate and the final decision.
//!
//! Aggressive, safe and neutral analysts rotate through the risk debate; the
//! risk manager closes the run with the final trade decision.

use super::{frame_report, prompt_timestamp, AgentRole};
use crate::state::{AnalysisState, ReportField, RiskStance, StateError};

/// Aggressive risk analyst: argues for taking the risk.
pub struct AggressiveRiskAnalyst;

impl AgentRole for AggressiveRiskAnalyst {
    fn name(&self) -> &'static str {
        "aggressive_risk_analyst"
    }

    fn role_description(&self) -> &'static str {
        "aggressive risk analyst favoring higher risk for higher return"
    }

    fn task_label(&self) -> &'static str {
        "aggressive risk analysis"
    }

    fn required_upstream(&self) -> &'static [ReportField] {
        &[ReportField::TraderInvestmentPlan]
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are an aggressive risk analyst who believes in high risk, high reward.\n\n\
             Current time: {}\n\n\
             Argue for the opportunity: the cost of missing it, why the risks are \
             manageable through active management, and the long-term growth being \
             underweighted. Push back on over-conservative readings and propose risk \
             controls that keep the position rather than kill it.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        let debate = &state.risk_debate_state;
        if debate.count == 0 {
            format!(
                "Assess the trader's plan from an aggressive risk standpoint.\n\n\
                 Trader plan:\n{}\n\n\
                 Identify the high-return opportunity, argue why the risks are controllable, \
                 and propose an aggressive but managed risk strategy.",
                state.trader_investment_plan
            )
        } else {
            format!(
                "The safe analyst argued:\n{}\n\n\
                 The neutral analyst argued:\n{}\n\n\
                 Rebut these views and hold the aggressive line: name the opportunity cost \
                 of their caution, show how the risks stay manageable, and defend the \
                 aggressive strategy with concrete controls.",
                debate.current_safe_response, debate.current_neutral_response
            )
        }
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        _mcp_enabled: bool,
    ) -> Result<(), StateError> {
        state
            .risk_debate_state
            .record_turn(RiskStance::Aggressive, content.to_string());
        Ok(())
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        // The failed turn still occupies its round so the rotation advances.
        state
            .risk_debate_state
            .record_turn(RiskStance::Aggressive, message);
        Ok(())
    }
}

/// Safe risk analyst: capital protection first.
pub struct SafeRiskAnalyst;

impl AgentRole for SafeRiskAnalyst {
    fn name(&self) -> &'static str {
        "safe_risk_analyst"
    }

    fn role_description(&self) -> &'static str {
        "conservative risk analyst prioritizing capital protection"
    }

    fn task_label(&self) -> &'static str {
        "conservative risk analysis"
    }

    fn required_upstream(&self) -> &'static [ReportField] {
        &[ReportField::TraderInvestmentPlan]
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a conservative risk analyst who puts capital protection first.\n\n\
             Current time: {}\n\n\
             Focus on downside: potential losses, tail events, liquidity and margin of \
             safety. Question optimistic assumptions, flag the traps in aggressive \
             strategies, and argue for hedging, diversification and position discipline.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        let debate = &state.risk_debate_state;
        format!(
            "The aggressive analyst argued:\n{}\n\n\
             The neutral analyst argued:\n{}\n\n\
             Answer from a conservative risk standpoint: the risk factors being ignored, \
             the assumptions that are too optimistic, why capital protection dominates \
             here, and the conservative controls you would impose.",
            debate.current_aggressive_response, debate.current_neutral_response
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        _mcp_enabled: bool,
    ) -> Result<(), StateError> {
        state
            .risk_debate_state
            .record_turn(RiskStance::Safe, content.to_string());
        Ok(())
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        // The failed turn still occupies its round so the rotation advances.
        state
            .risk_debate_state
            .record_turn(RiskStance::Safe, message);
        Ok(())
    }
}

/// Neutral risk analyst: balances both extremes.
pub struct NeutralRiskAnalyst;

impl AgentRole for NeutralRiskAnalyst {
    fn name(&self) -> &'static str {
        "neutral_risk_analyst"
    }

    fn role_description(&self) -> &'static str {
        "neutral risk analyst balancing opportunity against protection"
    }

    fn task_label(&self) -> &'static str {
        "neutral risk analysis"
    }

    fn required_upstream(&self) -> &'static [ReportField] {
        &[ReportField::TraderInvestmentPlan]
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a neutral risk analyst weighing both sides dispassionately.\n\n\
             Current time: {}\n\n\
             Assess where the aggressive case overreaches and where the conservative case \
             over-hedges. Quantify the trade-off where possible and land on a balanced \
             risk posture with concrete sizing and control suggestions.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        let debate = &state.risk_debate_state;
        format!(
            "The aggressive analyst argued:\n{}\n\n\
             The safe analyst argued:\n{}\n\n\
             Give the balanced read: what each side gets right and wrong, the realistic \
             risk/reward in between, and the middle-path controls and sizing you would \
             recommend.",
            debate.current_aggressive_response, debate.current_safe_response
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        _mcp_enabled: bool,
    ) -> Result<(), StateError> {
        state
            .risk_debate_state
            .record_turn(RiskStance::Neutral, content.to_string());
        Ok(())
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        // The failed turn still occupies its round so the rotation advances.
        state
            .risk_debate_state
            .record_turn(RiskStance::Neutral, message);
        Ok(())
    }
}

/// Risk manager: closes the run with the final trade decision.
pub struct RiskManager;

impl AgentRole for RiskManager {
    fn name(&self) -> &'static str {
        "risk_manager"
    }

    fn role_description(&self) -> &'static str {
        "risk manager issuing the final trade decision"
    }

    fn task_label(&self) -> &'static str {
        "final risk decision"
    }

    fn required_upstream(&self) -> &'static [ReportField] {
        &[ReportField::TraderInvestmentPlan]
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are the risk management director making the final call on the trader's \
             plan.\n\nCurrent time: {}\n\n\
             Weigh the full risk debate, then commit to exactly one verdict: approve, \
             approve with modifications, or reject. State the decisive risk factors, any \
             required modifications, and the monitoring conditions under which the \
             decision would be revisited.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Make the final risk decision for \"{}\".\n\n\
             Trader plan:\n{}\n\n\
             Full risk debate transcript:\n{}\n\n\
             Commit to one verdict (approve, approve with modifications, or reject) with \
             the decisive factors, required modifications, and monitoring conditions.",
            state.user_query, state.trader_investment_plan, state.risk_debate_state.history
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
            ReportField::FinalTradeDecision,
            frame_report(self.name(), &query, mcp_enabled, content),
        )
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::FinalTradeDecision, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: The aggressive opening uses the trader plan; later turns
    /// answer the other stances.
    #[test]
    fn aggressive_request_is_round_aware() {
        let mut state = AnalysisState::new("analyze AAPL");
        state.trader_investment_plan = "buy 100 shares".into();
        let opening = AggressiveRiskAnalyst.request(&state);
        assert!(opening.contains("buy 100 shares"));

        state
            .risk_debate_state
            .record_turn(RiskStance::Aggressive, "go big".into());
        state
            .risk_debate_state
            .record_turn(RiskStance::Safe, "too risky".into());
        state
            .risk_debate_state
            .record_turn(RiskStance::Neutral, "somewhere between".into());
        let rebuttal = AggressiveRiskAnalyst.request(&state);
        assert!(rebuttal.contains("too risky"));
        assert!(rebuttal.contains("somewhere between"));
    }

    /// **Scenario**: Safe and neutral requests quote the other two stances.
    #[test]
    fn safe_and_neutral_requests_quote_opponents() {
        let mut state = AnalysisState::new("q");
        state
            .risk_debate_state
            .record_turn(RiskStance::Aggressive, "lever up".into());
        let safe = SafeRiskAnalyst.request(&state);
        assert!(safe.contains("lever up"));

        state
            .risk_debate_state
            .record_turn(RiskStance::Safe, "cut the position".into());
        let neutral = NeutralRiskAnalyst.request(&state);
        assert!(neutral.contains("lever up"));
        assert!(neutral.contains("cut the position"));
    }

    /// **Scenario**: Risk turns rotate the counter; the manager writes the
    /// final decision exactly once.
    #[test]
    fn risk_turns_and_final_decision() {
        let mut state = AnalysisState::new("q");
        AggressiveRiskAnalyst.apply(&mut state, "a", false).unwrap();
        SafeRiskAnalyst.apply(&mut state, "s", false).unwrap();
        NeutralRiskAnalyst.apply(&mut state, "n", false).unwrap();
        assert_eq!(state.risk_debate_state.count, 3);

        RiskManager.apply(&mut state, "approve", false).unwrap();
        assert!(state.final_trade_decision.contains("approve"));
        assert!(RiskManager.apply(&mut state, "reject", false).is_err());
    }

    /// **Scenario**: The manager's request carries the plan and the transcript.
    #[test]
    fn risk_manager_request_includes_plan_and_history() {
        let mut state = AnalysisState::new("analyze AAPL");
        state.trader_investment_plan = "the plan".into();
        state
            .risk_debate_state
            .record_turn(RiskStance::Aggressive, "the debate".into());
        let request = RiskManager.request(&state);
        assert!(request.contains("the plan"));
        assert!(request.contains("the debate"));
        assert!(request.contains("approve with modifications"));
    }
}
