//! The research team: bull and bear debaters.
//!
//! Round-aware agents: the opening turn builds a standalone case, later turns
//! must answer the opponent's latest response. Each turn appends to the
//! investment debate transcript and advances its counter. A failed turn is
//! recorded too (with the error message as the turn text) so the round
//! counter keeps moving and the debate stays bounded.

use super::{prompt_timestamp, AgentRole};
use crate::state::{AnalysisState, DebateSide, StateError};

/// Bull researcher: builds the evidence-based case for buying.
pub struct BullResearcher;

impl AgentRole for BullResearcher {
    fn name(&self) -> &'static str {
        "bull_researcher"
    }

    fn role_description(&self) -> &'static str {
        "bull researcher building the evidence-based bullish case"
    }

    fn task_label(&self) -> &'static str {
        "bull research"
    }

    fn system_prompt(&self, state: &AnalysisState) -> String {
        format!(
            "You are a bull researcher arguing the long side of \"{}\".\n\n\
             Current time: {}\n\n\
             Build the strongest evidence-based bullish case from the analyst reports: \
             growth potential, underpriced value, positive technical and fundamental \
             signals. Engage the bear's latest points head-on, acknowledge real risks but \
             argue why the opportunity outweighs them, and state concrete reasons with \
             target levels. Stay professional and constructive.",
            state.user_query,
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        let debate = &state.investment_debate_state;
        if debate.count == 0 {
            format!(
                "Using all available analyst reports, build the strongest bullish investment \
                 case for \"{}\": core competitive advantages, growth potential, underpriced \
                 value, positive signals, and a concrete recommendation with target levels.",
                state.user_query
            )
        } else {
            format!(
                "The bear researcher just argued:\n{}\n\n\
                 Rebut these points directly and reinforce your bullish case: expose the \
                 limits of the bearish reading, bring counter-evidence, reinterpret the \
                 negatives, and highlight the positives being ignored.",
                debate.current_response
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
            .investment_debate_state
            .record_turn(DebateSide::Bull, content.to_string());
        Ok(())
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        // The failed turn still occupies its round so routing advances.
        state
            .investment_debate_state
            .record_turn(DebateSide::Bull, message);
        Ok(())
    }
}

/// Bear researcher: identifies risks and builds the case against.
pub struct BearResearcher;

impl AgentRole for BearResearcher {
    fn name(&self) -> &'static str {
        "bear_researcher"
    }

    fn role_description(&self) -> &'static str {
        "bear researcher identifying risks and building the bearish case"
    }

    fn task_label(&self) -> &'static str {
        "bear research"
    }

    fn system_prompt(&self, state: &AnalysisState) -> String {
        format!(
            "You are a bear researcher arguing the short side of \"{}\".\n\n\
             Current time: {}\n\n\
             Identify the real risks in the analyst reports: challenges, negative factors, \
             stretched valuations and over-optimistic expectations. Answer the bull's latest \
             points directly, keep the analysis objective, and emphasize what disciplined \
             risk management would demand here.",
            state.user_query,
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        let debate = &state.investment_debate_state;
        if debate.current_response.trim().is_empty() {
            format!(
                "Using all available analyst reports, run an independent risk analysis for \
                 \"{}\" and build the complete bearish case: the main risk factors, the \
                 negatives being underweighted, the over-optimistic assumptions, and a \
                 cautious recommendation.",
                state.user_query
            )
        } else {
            format!(
                "The bull researcher just argued:\n{}\n\n\
                 Answer with a rigorous risk analysis: the blind spots in the bullish \
                 reading, the neglected negatives, the assumptions that do not hold, and \
                 the complete bearish case that follows.",
                debate.current_response
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
            .investment_debate_state
            .record_turn(DebateSide::Bear, content.to_string());
        Ok(())
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state
            .investment_debate_state
            .record_turn(DebateSide::Bear, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: The opening bull request is standalone; later turns quote the bear.
    #[test]
    fn bull_request_is_round_aware() {
        let mut state = AnalysisState::new("analyze AAPL");
        let opening = BullResearcher.request(&state);
        assert!(opening.contains("bullish investment"));
        assert!(!opening.contains("just argued"));

        state
            .investment_debate_state
            .record_turn(DebateSide::Bull, "bull opening".into());
        state
            .investment_debate_state
            .record_turn(DebateSide::Bear, "bear pushback".into());
        let rebuttal = BullResearcher.request(&state);
        assert!(rebuttal.contains("bear pushback"));
        assert!(rebuttal.contains("Rebut"));
    }

    /// **Scenario**: The bear runs standalone when no bull turn preceded it.
    #[test]
    fn bear_request_handles_missing_opponent() {
        let state = AnalysisState::new("analyze AAPL");
        let independent = BearResearcher.request(&state);
        assert!(independent.contains("independent risk analysis"));

        let mut state = AnalysisState::new("analyze AAPL");
        state
            .investment_debate_state
            .record_turn(DebateSide::Bull, "strong bull case".into());
        let reply = BearResearcher.request(&state);
        assert!(reply.contains("strong bull case"));
    }

    /// **Scenario**: Each successful turn advances the debate by exactly one round.
    #[test]
    fn turns_advance_debate_counter() {
        let mut state = AnalysisState::new("q");
        BullResearcher.apply(&mut state, "case", false).unwrap();
        assert_eq!(state.investment_debate_state.count, 1);
        assert!(state.investment_debate_state.history.contains("【bull round 1】"));
        BearResearcher.apply(&mut state, "rebuttal", false).unwrap();
        assert_eq!(state.investment_debate_state.count, 2);
        assert_eq!(state.investment_debate_state.current_response, "rebuttal");
    }

    /// **Scenario**: A failed turn is recorded with the error text so the
    /// round counter keeps advancing.
    #[test]
    fn apply_error_records_turn_with_error_text() {
        let mut state = AnalysisState::new("q");
        BullResearcher
            .apply_error(&mut state, "bull research error: boom".into())
            .unwrap();
        assert_eq!(state.investment_debate_state.count, 1);
        assert!(state
            .investment_debate_state
            .history
            .contains("bull research error: boom"));
        assert_eq!(
            state.investment_debate_state.current_response,
            "bull research error: boom"
        );
    }
}
