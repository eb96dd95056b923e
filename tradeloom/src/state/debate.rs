//! Debate substates: append-only transcripts with round counters.
//!
//! Each debate keeps a full transcript with round markers, a per-side history,
//! and a last-response slot per participant. The counter increments once per
//! turn; routing functions consume only the counter.

use serde::{Deserialize, Serialize};

/// Participant in the bull/bear investment debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebateSide {
    Bull,
    Bear,
}

impl DebateSide {
    fn label(&self) -> &'static str {
        match self {
            Self::Bull => "bull",
            Self::Bear => "bear",
        }
    }
}

/// Participant in the three-way risk debate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskStance {
    Aggressive,
    Safe,
    Neutral,
}

impl RiskStance {
    fn label(&self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Safe => "safe",
            Self::Neutral => "neutral",
        }
    }
}

/// Bull vs bear debate state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestmentDebateState {
    /// Full transcript with round markers.
    pub history: String,
    /// Bull-side transcript.
    pub bull_history: String,
    /// Bear-side transcript.
    pub bear_history: String,
    /// Last speaker's text, whichever side spoke.
    pub current_response: String,
    /// Rounds completed. One turn by one participant is one round.
    pub count: u32,
}

impl InvestmentDebateState {
    /// Records one debate turn: appends the marked entry to the transcript and
    /// the speaker's history, updates the last response, and advances the
    /// counter by exactly one.
    pub fn record_turn(&mut self, side: DebateSide, text: String) {
        let round = self.count + 1;
        self.history
            .push_str(&format!("\n\n【{} round {}】:\n{}", side.label(), round, text));
        let side_history = match side {
            DebateSide::Bull => &mut self.bull_history,
            DebateSide::Bear => &mut self.bear_history,
        };
        side_history.push_str(&format!("\n\nround {}: {}", round, text));
        self.current_response = text;
        self.count = round;
    }
}

/// Three-way risk debate state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskDebateState {
    /// Full transcript with round markers.
    pub history: String,
    /// Per-stance transcripts.
    pub aggressive_history: String,
    pub safe_history: String,
    pub neutral_history: String,
    /// Last response per participant.
    pub current_aggressive_response: String,
    pub current_safe_response: String,
    pub current_neutral_response: String,
    /// Rounds completed.
    pub count: u32,
}

impl RiskDebateState {
    /// Records one risk debate turn, analogous to the investment debate.
    pub fn record_turn(&mut self, stance: RiskStance, text: String) {
        let round = self.count + 1;
        self.history.push_str(&format!(
            "\n\n【{} round {}】:\n{}",
            stance.label(),
            round,
            text
        ));
        let (stance_history, current) = match stance {
            RiskStance::Aggressive => (
                &mut self.aggressive_history,
                &mut self.current_aggressive_response,
            ),
            RiskStance::Safe => (&mut self.safe_history, &mut self.current_safe_response),
            RiskStance::Neutral => (
                &mut self.neutral_history,
                &mut self.current_neutral_response,
            ),
        };
        stance_history.push_str(&format!("\n\nround {}: {}", round, text));
        *current = text;
        self.count = round;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Each turn adds one round marker and advances the counter by one.
    #[test]
    fn investment_debate_counts_rounds() {
        let mut debate = InvestmentDebateState::default();
        debate.record_turn(DebateSide::Bull, "opening bull case".into());
        assert_eq!(debate.count, 1);
        assert!(debate.history.contains("【bull round 1】"));
        assert!(debate.bull_history.contains("round 1: opening bull case"));
        assert_eq!(debate.current_response, "opening bull case");

        debate.record_turn(DebateSide::Bear, "bear rebuttal".into());
        assert_eq!(debate.count, 2);
        assert!(debate.history.contains("【bear round 2】"));
        assert!(debate.bear_history.contains("round 2: bear rebuttal"));
        assert_eq!(debate.current_response, "bear rebuttal");
        assert!(debate.bull_history.contains("opening bull case"));
    }

    /// **Scenario**: The marker count in the transcript matches the counter.
    #[test]
    fn investment_debate_marker_count_matches_counter() {
        let mut debate = InvestmentDebateState::default();
        debate.record_turn(DebateSide::Bull, "a".into());
        debate.record_turn(DebateSide::Bear, "b".into());
        debate.record_turn(DebateSide::Bull, "c".into());
        let markers = debate.history.matches("round").count();
        assert_eq!(markers as u32, debate.count);
    }

    /// **Scenario**: Risk turns keep one last-response slot per stance.
    #[test]
    fn risk_debate_tracks_per_stance_responses() {
        let mut debate = RiskDebateState::default();
        debate.record_turn(RiskStance::Aggressive, "take the risk".into());
        debate.record_turn(RiskStance::Safe, "protect capital".into());
        debate.record_turn(RiskStance::Neutral, "balance both".into());

        assert_eq!(debate.count, 3);
        assert_eq!(debate.current_aggressive_response, "take the risk");
        assert_eq!(debate.current_safe_response, "protect capital");
        assert_eq!(debate.current_neutral_response, "balance both");
        assert!(debate.history.contains("【aggressive round 1】"));
        assert!(debate.history.contains("【safe round 2】"));
        assert!(debate.history.contains("【neutral round 3】"));

        debate.record_turn(RiskStance::Aggressive, "second take".into());
        assert_eq!(debate.current_aggressive_response, "second take");
        assert_eq!(debate.current_safe_response, "protect capital");
        assert_eq!(debate.count, 4);
    }
}
