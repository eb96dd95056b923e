//! # Tradeloom
//!
//! A multi-agent trading analysis orchestrator with a **state-in, state-out**
//! design: one [`AnalysisState`] flows through a fixed graph of fifteen
//! prompt-specialized agents: four analysts, a bounded bull/bear debate, a
//! managing decision, a trading plan, a bounded three-way risk debate and a
//! final risk decision. Agents may call external tools through MCP servers,
//! gated per agent; every run is mirrored into an append-only JSON session
//! log that survives process crashes.
//!
//! ## Main modules
//!
//! - [`graph`]: [`StateGraph`], [`CompiledStateGraph`], [`Node`], [`Next`]:
//!   build and run state graphs with conditional edges and cooperative
//!   cancellation.
//! - [`state`]: [`AnalysisState`] with write-once report fields and the two
//!   debate substates.
//! - [`agent`]: the [`AgentRole`] contract, the shared [`AgentNode`] harness,
//!   and the fifteen concrete roles.
//! - [`llm`]: [`LlmClient`] trait, [`ChatOpenAI`], [`MockLlm`], and the
//!   tool-call loop [`chat_with_tools`].
//! - [`mcp`]: [`McpToolBroker`] with stdio and Streamable HTTP sessions,
//!   per-agent permission gating, and the flat tool catalog.
//! - [`recorder`]: [`SessionRecorder`], the crash-resistant session log.
//! - [`workflow`]: the fixed analysis graph, debate routing, and the
//!   [`Orchestrator`] facade.
//! - [`config`]: typed [`Settings`] from the environment plus the MCP server
//!   table from `mcp_config.json`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use tradeloom::config::{McpConfig, Settings};
//! use tradeloom::workflow::Orchestrator;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env()?;
//! let mcp_config = McpConfig::load(std::path::Path::new("mcp_config.json"))?;
//! let orchestrator = Orchestrator::new(settings, mcp_config);
//! let _ = orchestrator.initialize().await?;
//! let state = orchestrator
//!     .run_analysis("analyze AAPL", CancellationToken::new())
//!     .await?;
//! println!("{}", state.final_trade_decision);
//! orchestrator.close().await;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod mcp;
pub mod message;
pub mod recorder;
pub mod state;
pub mod workflow;

pub use agent::{AgentContext, AgentNode, AgentRole};
pub use error::AgentError;
pub use graph::{CompiledStateGraph, Next, Node, StateGraph};
pub use llm::{chat_with_tools, ChatOpenAI, LlmClient, MockLlm};
pub use mcp::{McpToolBroker, ToolBroker, ToolSpec};
pub use message::Message;
pub use recorder::{SessionRecorder, SessionStatus};
pub use state::AnalysisState;
pub use workflow::Orchestrator;
pub use config::Settings;
