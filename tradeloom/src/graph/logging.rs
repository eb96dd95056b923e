//! Structured logging helpers for graph execution.
//!
//! Thin wrappers over `tracing` so the run loop stays readable and the log
//! fields stay consistent across node start/complete and routing decisions.

use crate::error::AgentError;

use super::Next;

/// Logs the start of a graph run.
pub fn log_graph_start(node_count: usize) {
    tracing::info!(node_count, "graph run started");
}

/// Logs the start of a node execution.
pub fn log_node_start(node_id: &str) {
    tracing::debug!(node = %node_id, "node started");
}

/// Logs the completion of a node execution together with its `Next` decision.
pub fn log_node_complete(node_id: &str, next: &Next) {
    tracing::debug!(node = %node_id, next = ?next, "node completed");
}

/// Logs a conditional routing decision.
pub fn log_routing(from: &str, to: &str) {
    tracing::debug!(from = %from, to = %to, "conditional routing");
}

/// Logs graph completion.
pub fn log_graph_complete() {
    tracing::info!("graph run completed");
}

/// Logs cancellation of a run between nodes.
pub fn log_graph_cancelled(before_node: &str) {
    tracing::warn!(before = %before_node, "graph run cancelled");
}

/// Logs a graph-level error.
pub fn log_graph_error(err: &AgentError) {
    tracing::error!(error = %err, "graph run failed");
}
