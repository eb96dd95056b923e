//! The fixed analysis workflow: node names, debate routing, graph assembly.
//!
//! ```text
//! START
//!   → market_analyst → sentiment_analyst → news_analyst → fundamentals_analyst
//!   → bull_researcher ↔ bear_researcher      (bounded loop)
//!   → research_manager → trader
//!   → aggressive ↔ safe ↔ neutral risk       (bounded three-way loop)
//!   → risk_manager → END
//! ```
//!
//! Routing functions consume only the debate counters, so execution order is
//! fully determined by the configuration and the number of completed turns.

mod orchestrator;

pub use orchestrator::{Orchestrator, WorkflowInfo};

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::{
    AgentContext, AgentNode, AgentRole, AggressiveRiskAnalyst, BearResearcher, BullResearcher,
    CompanyOverviewAnalyst, FundamentalsAnalyst, MarketAnalyst, NeutralRiskAnalyst, NewsAnalyst,
    ProductAnalyst, ResearchManager, RiskManager, SafeRiskAnalyst, SentimentAnalyst,
    ShareholderAnalyst, Trader,
};
use crate::config::WorkflowSettings;
use crate::graph::{CompilationError, CompiledStateGraph, StateGraph, END, START};
use crate::state::AnalysisState;

pub const MARKET_ANALYST: &str = "market_analyst";
pub const SENTIMENT_ANALYST: &str = "sentiment_analyst";
pub const NEWS_ANALYST: &str = "news_analyst";
pub const FUNDAMENTALS_ANALYST: &str = "fundamentals_analyst";
pub const COMPANY_OVERVIEW_ANALYST: &str = "company_overview_analyst";
pub const SHAREHOLDER_ANALYST: &str = "shareholder_analyst";
pub const PRODUCT_ANALYST: &str = "product_analyst";
pub const BULL_RESEARCHER: &str = "bull_researcher";
pub const BEAR_RESEARCHER: &str = "bear_researcher";
pub const RESEARCH_MANAGER: &str = "research_manager";
pub const TRADER: &str = "trader";
pub const AGGRESSIVE_RISK_ANALYST: &str = "aggressive_risk_analyst";
pub const SAFE_RISK_ANALYST: &str = "safe_risk_analyst";
pub const NEUTRAL_RISK_ANALYST: &str = "neutral_risk_analyst";
pub const RISK_MANAGER: &str = "risk_manager";

/// Every agent in the catalog. Drives the permission table and diagnostics.
pub const AGENT_NAMES: [&str; 15] = [
    MARKET_ANALYST,
    SENTIMENT_ANALYST,
    NEWS_ANALYST,
    FUNDAMENTALS_ANALYST,
    COMPANY_OVERVIEW_ANALYST,
    SHAREHOLDER_ANALYST,
    PRODUCT_ANALYST,
    BULL_RESEARCHER,
    BEAR_RESEARCHER,
    RESEARCH_MANAGER,
    TRADER,
    AGGRESSIVE_RISK_ANALYST,
    SAFE_RISK_ANALYST,
    NEUTRAL_RISK_ANALYST,
    RISK_MANAGER,
];

/// All catalog roles, for diagnostics (`workflow_info`).
pub fn catalog_roles() -> Vec<Arc<dyn AgentRole>> {
    vec![
        Arc::new(MarketAnalyst),
        Arc::new(SentimentAnalyst),
        Arc::new(NewsAnalyst),
        Arc::new(FundamentalsAnalyst),
        Arc::new(CompanyOverviewAnalyst),
        Arc::new(ShareholderAnalyst),
        Arc::new(ProductAnalyst),
        Arc::new(BullResearcher),
        Arc::new(BearResearcher),
        Arc::new(ResearchManager),
        Arc::new(Trader),
        Arc::new(AggressiveRiskAnalyst),
        Arc::new(SafeRiskAnalyst),
        Arc::new(NeutralRiskAnalyst),
        Arc::new(RiskManager),
    ]
}

/// Workflow bounds and shape.
#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Investment debate turn bound (default 3).
    pub max_debate_rounds: u32,
    /// Risk debate turn bound (default 2).
    pub max_risk_debate_rounds: u32,
    /// Schedule the three extended analysts between fundamentals and the debate.
    pub extended_analysts: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            max_debate_rounds: 3,
            max_risk_debate_rounds: 2,
            extended_analysts: false,
        }
    }
}

impl From<&WorkflowSettings> for WorkflowOptions {
    fn from(settings: &WorkflowSettings) -> Self {
        Self {
            max_debate_rounds: settings.max_debate_rounds,
            max_risk_debate_rounds: settings.max_risk_debate_rounds,
            extended_analysts: settings.extended_analysts,
        }
    }
}

/// Next node after a researcher turn.
///
/// The first bull turn makes `count = 1`, so "count odd ⇒ bear next" alternates
/// exactly. With `max_debate_rounds = 0` the bull still runs once before this
/// is first consulted, so the debate closes after that single turn.
pub fn next_investment_debate_node(count: u32, max_debate_rounds: u32) -> &'static str {
    if count < max_debate_rounds {
        if count % 2 == 1 {
            BEAR_RESEARCHER
        } else {
            BULL_RESEARCHER
        }
    } else {
        RESEARCH_MANAGER
    }
}

/// Next node after a risk debate turn: aggressive → safe → neutral → aggressive …
pub fn next_risk_debate_node(count: u32, max_risk_debate_rounds: u32) -> &'static str {
    if count < max_risk_debate_rounds {
        match count % 3 {
            1 => SAFE_RISK_ANALYST,
            2 => NEUTRAL_RISK_ANALYST,
            _ => AGGRESSIVE_RISK_ANALYST,
        }
    } else {
        RISK_MANAGER
    }
}

fn path_map(targets: &[&str]) -> HashMap<String, String> {
    targets
        .iter()
        .map(|t| ((*t).to_string(), (*t).to_string()))
        .collect()
}

/// Assembles and compiles the analysis graph against one run's context.
pub fn build_workflow(
    ctx: Arc<AgentContext>,
    options: &WorkflowOptions,
) -> Result<CompiledStateGraph<AnalysisState>, CompilationError> {
    let mut graph = StateGraph::<AnalysisState>::new();

    let node = |role: Arc<dyn AgentRole>| Arc::new(AgentNode::new(role, ctx.clone()));
    let staged = |role: Arc<dyn AgentRole>, stage: &'static str, desc: &'static str| {
        Arc::new(AgentNode::new(role, ctx.clone()).with_stage(stage, desc))
    };

    graph.add_node(
        MARKET_ANALYST,
        staged(Arc::new(MarketAnalyst), "analysts", "analyst team reports"),
    );
    graph.add_node(SENTIMENT_ANALYST, node(Arc::new(SentimentAnalyst)));
    graph.add_node(NEWS_ANALYST, node(Arc::new(NewsAnalyst)));
    graph.add_node(FUNDAMENTALS_ANALYST, node(Arc::new(FundamentalsAnalyst)));
    if options.extended_analysts {
        graph.add_node(COMPANY_OVERVIEW_ANALYST, node(Arc::new(CompanyOverviewAnalyst)));
        graph.add_node(SHAREHOLDER_ANALYST, node(Arc::new(ShareholderAnalyst)));
        graph.add_node(PRODUCT_ANALYST, node(Arc::new(ProductAnalyst)));
    }
    graph.add_node(
        BULL_RESEARCHER,
        staged(
            Arc::new(BullResearcher),
            "investment_debate",
            "bull and bear researcher debate",
        ),
    );
    graph.add_node(
        BEAR_RESEARCHER,
        staged(
            Arc::new(BearResearcher),
            "investment_debate",
            "bull and bear researcher debate",
        ),
    );
    graph.add_node(
        RESEARCH_MANAGER,
        staged(
            Arc::new(ResearchManager),
            "management",
            "investment decision and trading plan",
        ),
    );
    graph.add_node(
        TRADER,
        staged(
            Arc::new(Trader),
            "management",
            "investment decision and trading plan",
        ),
    );
    graph.add_node(
        AGGRESSIVE_RISK_ANALYST,
        staged(
            Arc::new(AggressiveRiskAnalyst),
            "risk_debate",
            "three-way risk debate",
        ),
    );
    graph.add_node(
        SAFE_RISK_ANALYST,
        staged(
            Arc::new(SafeRiskAnalyst),
            "risk_debate",
            "three-way risk debate",
        ),
    );
    graph.add_node(
        NEUTRAL_RISK_ANALYST,
        staged(
            Arc::new(NeutralRiskAnalyst),
            "risk_debate",
            "three-way risk debate",
        ),
    );
    graph.add_node(
        RISK_MANAGER,
        staged(Arc::new(RiskManager), "decision", "final trade decision"),
    );

    graph.add_edge(START, MARKET_ANALYST);
    graph.add_edge(MARKET_ANALYST, SENTIMENT_ANALYST);
    graph.add_edge(SENTIMENT_ANALYST, NEWS_ANALYST);
    graph.add_edge(NEWS_ANALYST, FUNDAMENTALS_ANALYST);
    if options.extended_analysts {
        graph.add_edge(FUNDAMENTALS_ANALYST, COMPANY_OVERVIEW_ANALYST);
        graph.add_edge(COMPANY_OVERVIEW_ANALYST, SHAREHOLDER_ANALYST);
        graph.add_edge(SHAREHOLDER_ANALYST, PRODUCT_ANALYST);
        graph.add_edge(PRODUCT_ANALYST, BULL_RESEARCHER);
    } else {
        graph.add_edge(FUNDAMENTALS_ANALYST, BULL_RESEARCHER);
    }

    let max_debate = options.max_debate_rounds;
    graph.add_conditional_edges(
        BULL_RESEARCHER,
        Arc::new(move |s: &AnalysisState| {
            next_investment_debate_node(s.investment_debate_state.count, max_debate).to_string()
        }),
        Some(path_map(&[BEAR_RESEARCHER, RESEARCH_MANAGER])),
    );
    graph.add_conditional_edges(
        BEAR_RESEARCHER,
        Arc::new(move |s: &AnalysisState| {
            next_investment_debate_node(s.investment_debate_state.count, max_debate).to_string()
        }),
        Some(path_map(&[BULL_RESEARCHER, RESEARCH_MANAGER])),
    );

    graph.add_edge(RESEARCH_MANAGER, TRADER);
    graph.add_edge(TRADER, AGGRESSIVE_RISK_ANALYST);

    let max_risk = options.max_risk_debate_rounds;
    graph.add_conditional_edges(
        AGGRESSIVE_RISK_ANALYST,
        Arc::new(move |s: &AnalysisState| {
            next_risk_debate_node(s.risk_debate_state.count, max_risk).to_string()
        }),
        Some(path_map(&[SAFE_RISK_ANALYST, RISK_MANAGER])),
    );
    graph.add_conditional_edges(
        SAFE_RISK_ANALYST,
        Arc::new(move |s: &AnalysisState| {
            next_risk_debate_node(s.risk_debate_state.count, max_risk).to_string()
        }),
        Some(path_map(&[NEUTRAL_RISK_ANALYST, RISK_MANAGER])),
    );
    graph.add_conditional_edges(
        NEUTRAL_RISK_ANALYST,
        Arc::new(move |s: &AnalysisState| {
            next_risk_debate_node(s.risk_debate_state.count, max_risk).to_string()
        }),
        Some(path_map(&[AGGRESSIVE_RISK_ANALYST, RISK_MANAGER])),
    );

    graph.add_edge(RISK_MANAGER, END);

    graph.compile()
}
