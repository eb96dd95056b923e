//! Compiled state graph: immutable, supports invoke only.
//!
//! Built by `StateGraph::compile`. Holds the node map and the routing table
//! derived from explicit and conditional edges. A run steps from the first
//! node until END, checking the cancellation token between nodes; on cancel
//! the current state is returned as the result.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

use super::conditional::NextEntry;
use super::logging::{
    log_graph_cancelled, log_graph_complete, log_graph_error, log_graph_start, log_node_complete,
    log_node_start, log_routing,
};
use super::state_graph::END;
use super::{Next, Node};

/// Compiled graph: immutable structure, supports invoke only.
///
/// Created by `StateGraph::compile()`. Runs from the first node; after each
/// node, uses the node's returned `Next` or the conditional router (when
/// present) to choose the next node. Cancellation is cooperative: the token is
/// checked before every node, and on cancel the run stops and returns the
/// state accumulated so far.
#[derive(Clone)]
pub struct CompiledStateGraph<S> {
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    /// First node to run (the single edge from START).
    pub(super) first_node_id: String,
    /// Map from node id to how to get the next node.
    pub(super) next_map: HashMap<String, NextEntry<S>>,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Runs the graph with the given state.
    ///
    /// Steps from the first node; after each node, resolves the next node from
    /// the conditional router (when the node has conditional edges) or from
    /// the node's returned `Next`. Stops at END, when a node returns
    /// `Next::End`, or when `cancel` fires between nodes; in all three cases
    /// the current state is the result. Errors are engine-level only (an
    /// unknown node id at runtime); node-level failures are expected to be
    /// captured by the nodes themselves.
    pub async fn invoke(&self, state: S, cancel: &CancellationToken) -> Result<S, AgentError> {
        if self.nodes.is_empty() || !self.nodes.contains_key(&self.first_node_id) {
            return Err(AgentError::ExecutionFailed("empty graph".into()));
        }
        log_graph_start(self.nodes.len());

        let mut state = state;
        let mut current_id = self.first_node_id.clone();

        loop {
            if cancel.is_cancelled() {
                log_graph_cancelled(&current_id);
                return Ok(state);
            }

            let node = match self.nodes.get(&current_id) {
                Some(n) => n.clone(),
                None => {
                    let err =
                        AgentError::ExecutionFailed(format!("unknown node id: {current_id}"));
                    log_graph_error(&err);
                    return Err(err);
                }
            };

            log_node_start(&current_id);
            let (new_state, next) = match node.run(state.clone()).await {
                Ok(output) => output,
                Err(e) => {
                    log_graph_error(&e);
                    return Err(e);
                }
            };
            log_node_complete(&current_id, &next);
            state = new_state;

            let next_id: Option<String> =
                if let Some(NextEntry::Conditional(router)) = self.next_map.get(&current_id) {
                    let target = router.resolve_next(&state);
                    log_routing(&current_id, &target);
                    Some(target)
                } else {
                    match next {
                        Next::End => None,
                        Next::Node(id) => Some(id),
                        Next::Continue => {
                            self.next_map.get(&current_id).and_then(|e| match e {
                                NextEntry::Unconditional(id) => Some(id.clone()),
                                NextEntry::Conditional(_) => None,
                            })
                        }
                    }
                };

            match next_id {
                None => break,
                Some(id) if id == END => break,
                Some(id) => current_id = id,
            }
        }

        log_graph_complete();
        Ok(state)
    }
}
