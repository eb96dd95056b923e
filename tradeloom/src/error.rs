//! Agent execution error types.
//!
//! Used by `Node::run` and the agent harness. Tool failures and per-agent
//! failures are converted to state data before they reach the engine, so the
//! engine only ever sees errors for genuine execution problems.

use thiserror::Error;

/// Agent execution error.
///
/// Returned by `Node::run` when a step fails. Per-agent failures are captured
/// by the harness and written into the analysis state instead, so in practice
/// this surfaces only LLM transport failures inside the chat loop and
/// invariant violations inside the engine.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Execution failed with a message (e.g. LLM call failed, empty graph).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}
