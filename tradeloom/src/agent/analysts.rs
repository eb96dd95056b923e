//! The analyst team: plain (non-round) agents that each write one report.
//!
//! Four core analysts cover market technicals, sentiment, news and
//! fundamentals; three extended analysts cover company overview, shareholder
//! structure and product lines. All share the same contract: read the user
//! query, optionally pull live data through MCP tools, write one framed
//! report field.

use super::{frame_report, prompt_timestamp, AgentRole};
use crate::state::{AnalysisState, ReportField, StateError};

/// Writes a framed report into the analyst's designated field.
fn apply_report(
    state: &mut AnalysisState,
    agent: &'static str,
    field: ReportField,
    content: &str,
    mcp_enabled: bool,
) -> Result<(), StateError> {
    let query = state.user_query.clone();
    state.write_report(field, frame_report(agent, &query, mcp_enabled, content))
}

/// Market analyst: overall trend, technical indicators, support/resistance.
pub struct MarketAnalyst;

impl AgentRole for MarketAnalyst {
    fn name(&self) -> &'static str {
        "market_analyst"
    }

    fn role_description(&self) -> &'static str {
        "market analyst focused on overall trends, technical indicators and macro context"
    }

    fn task_label(&self) -> &'static str {
        "market analysis"
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a seasoned market analyst specializing in price trends and technical \
             indicators.\n\nCurrent time: {}\n\n\
             Working principles: use the available external tools to fetch live prices and \
             indicators before analyzing; do not rely on stale knowledge.\n\n\
             Your responsibilities:\n\
             1. Fetch the latest technical indicators for the target (moving averages, RSI, MACD)\n\
             2. Assess the overall market environment and trend\n\
             3. Analyze volume and price action patterns\n\
             4. Identify key support and resistance levels\n\
             5. State a clear technical view: bullish, bearish or neutral\n\n\
             Ground every claim in the data you fetched and give concrete numbers.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Run a full technical market analysis for the user query \"{}\".\n\n\
             Use your external tools to get the latest price data and market information first, \
             then analyze trend, volume, support/resistance, and give short- and medium-term \
             price expectations grounded in that data.",
            state.user_query
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        apply_report(state, self.name(), ReportField::MarketReport, content, mcp_enabled)
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::MarketReport, message)
    }
}

/// Sentiment analyst: social media mood, investor psychology, crowd extremes.
pub struct SentimentAnalyst;

impl AgentRole for SentimentAnalyst {
    fn name(&self) -> &'static str {
        "sentiment_analyst"
    }

    fn role_description(&self) -> &'static str {
        "sentiment analyst covering social media mood and investor psychology"
    }

    fn task_label(&self) -> &'static str {
        "sentiment analysis"
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a market sentiment analyst reading social media, commentary and \
             positioning data.\n\nCurrent time: {}\n\n\
             Fetch current sentiment data through your tools before concluding anything.\n\
             Focus on: discussion heat and polarity around the target, retail versus \
             institutional mood, fear/greed extremes, and whether sentiment currently drives \
             price. Separate short-lived mood swings from durable shifts and state the \
             sentiment-side opportunity or risk explicitly.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Analyze current market sentiment for the user query \"{}\".\n\n\
             Pull the latest sentiment indicators and discussion data with your tools, gauge \
             investor psychology and crowd positioning, flag any sentiment extremes, and give \
             a sentiment-side read with supporting numbers.",
            state.user_query
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        apply_report(
            state,
            self.name(),
            ReportField::SentimentReport,
            content,
            mcp_enabled,
        )
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::SentimentReport, message)
    }
}

/// News analyst: events, policy changes, information-side impact.
pub struct NewsAnalyst;

impl AgentRole for NewsAnalyst {
    fn name(&self) -> &'static str {
        "news_analyst"
    }

    fn role_description(&self) -> &'static str {
        "news analyst covering events, policy changes and industry dynamics"
    }

    fn task_label(&self) -> &'static str {
        "news analysis"
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a news analyst assessing how events move prices.\n\nCurrent time: {}\n\n\
             Search for the latest relevant news with your tools before analyzing.\n\
             Cover: breaking company news, policy and regulatory changes, industry and \
             competitive dynamics, and management moves. Weigh each item's credibility and \
             blast radius, distinguish one-off events from trend changes, and conclude with \
             the information-side investment implication.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Analyze the news and information environment for the user query \"{}\".\n\n\
             Search for the latest company, policy and industry news with your tools, assess \
             each item's market impact, and summarize the net information-side implication.",
            state.user_query
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        apply_report(state, self.name(), ReportField::NewsReport, content, mcp_enabled)
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::NewsReport, message)
    }
}

/// Fundamentals analyst: financials, valuation, competitive moat.
pub struct FundamentalsAnalyst;

impl AgentRole for FundamentalsAnalyst {
    fn name(&self) -> &'static str {
        "fundamentals_analyst"
    }

    fn role_description(&self) -> &'static str {
        "fundamentals analyst covering financials, valuation and competitive position"
    }

    fn task_label(&self) -> &'static str {
        "fundamentals analysis"
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a fundamentals analyst valuing companies from their financials.\n\n\
             Current time: {}\n\n\
             Fetch the latest statements and ratios with your tools before valuing anything.\n\
             Your responsibilities:\n\
             1. Pull current financial statements and key ratios (revenue, margins, ROE, cash flow)\n\
             2. Assess profitability and growth quality\n\
             3. Value the company (PE, PB, versus peers)\n\
             4. Judge the competitive moat\n\
             5. Conclude with an explicit fundamentals rating\n\n\
             Compare against sector peers and make the valuation arithmetic visible.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Run a full fundamentals analysis for the user query \"{}\".\n\n\
             Use your tools to fetch the latest financial statements, key ratios and valuation \
             metrics, compare against industry peers, and conclude with a fundamentals rating \
             and the reasoning behind it.",
            state.user_query
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        apply_report(
            state,
            self.name(),
            ReportField::FundamentalsReport,
            content,
            mcp_enabled,
        )
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::FundamentalsReport, message)
    }
}

/// Company overview analyst (extended catalog): business model and history.
pub struct CompanyOverviewAnalyst;

impl AgentRole for CompanyOverviewAnalyst {
    fn name(&self) -> &'static str {
        "company_overview_analyst"
    }

    fn role_description(&self) -> &'static str {
        "company overview analyst covering business model, segments and history"
    }

    fn task_label(&self) -> &'static str {
        "company overview analysis"
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a company research analyst producing concise company profiles.\n\n\
             Current time: {}\n\n\
             Fetch current company information with your tools first. Describe what the \
             company actually does: business segments and revenue mix, key markets, history \
             and strategy, and where it sits in its industry. Keep it factual; the valuation \
             verdict belongs to other analysts.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Build a company overview for the user query \"{}\": business segments, revenue \
             mix, markets served, strategy and industry position, based on the latest \
             information your tools can fetch.",
            state.user_query
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        apply_report(
            state,
            self.name(),
            ReportField::CompanyOverviewReport,
            content,
            mcp_enabled,
        )
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::CompanyOverviewReport, message)
    }
}

/// Shareholder analyst (extended catalog): ownership structure and flows.
pub struct ShareholderAnalyst;

impl AgentRole for ShareholderAnalyst {
    fn name(&self) -> &'static str {
        "shareholder_analyst"
    }

    fn role_description(&self) -> &'static str {
        "shareholder analyst covering ownership structure, insider and institutional flows"
    }

    fn task_label(&self) -> &'static str {
        "shareholder analysis"
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are an ownership-structure analyst.\n\nCurrent time: {}\n\n\
             Fetch current holder data with your tools first. Cover: major holders and their \
             recent changes, institutional versus retail split, insider transactions, share \
             count changes (buybacks, dilution), and what the ownership picture implies for \
             the stock.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Analyze the shareholder structure for the user query \"{}\": major holders, \
             recent ownership changes, insider activity and buyback/dilution trends, with \
             the investment implication of each.",
            state.user_query
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        apply_report(
            state,
            self.name(),
            ReportField::ShareholderReport,
            content,
            mcp_enabled,
        )
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::ShareholderReport, message)
    }
}

/// Product analyst (extended catalog): product lines and pipeline.
pub struct ProductAnalyst;

impl AgentRole for ProductAnalyst {
    fn name(&self) -> &'static str {
        "product_analyst"
    }

    fn role_description(&self) -> &'static str {
        "product analyst covering product lines, pipeline and competitive standing"
    }

    fn task_label(&self) -> &'static str {
        "product analysis"
    }

    fn system_prompt(&self, _state: &AnalysisState) -> String {
        format!(
            "You are a product analyst evaluating a company's offering.\n\nCurrent time: {}\n\n\
             Fetch current product information with your tools first. Cover: the main product \
             lines and their revenue contribution, the launch pipeline, pricing power, how \
             the products stack up against competitors, and product-side risks such as \
             concentration or obsolescence.",
            prompt_timestamp()
        )
    }

    fn request(&self, state: &AnalysisState) -> String {
        format!(
            "Analyze the product portfolio for the user query \"{}\": main lines and their \
             revenue weight, pipeline, competitive standing and product-side risks, based on \
             the latest information your tools can fetch.",
            state.user_query
        )
    }

    fn apply(
        &self,
        state: &mut AnalysisState,
        content: &str,
        mcp_enabled: bool,
    ) -> Result<(), StateError> {
        apply_report(
            state,
            self.name(),
            ReportField::ProductReport,
            content,
            mcp_enabled,
        )
    }

    fn apply_error(&self, state: &mut AnalysisState, message: String) -> Result<(), StateError> {
        state.write_report(ReportField::ProductReport, message)
    }
}
