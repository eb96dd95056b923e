//! Next-step result from a graph node: continue the chain, jump to a node, or end.

/// Next step after running a node.
///
/// - **Continue**: follow the node's outgoing edge (or conditional router).
/// - **Node(id)**: jump to the given node.
/// - **End**: stop; return the current state as the final result.
///
/// **Interaction**: Returned by `Node::run`; consumed by the compiled graph's
/// run loop. For nodes with conditional edges the router's decision takes
/// precedence over the returned value.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Next {
    /// Follow the node's outgoing edge; if the node is last, equivalent to End.
    Continue,
    /// Run the node with the given id next.
    Node(String),
    /// Stop and return the current state.
    End,
}
