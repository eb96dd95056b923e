//! State graph: nodes plus explicit edges and conditional routing.
//!
//! Build with `add_node` / `add_edge(from, to)` (use `START` and `END` for
//! entry/exit) and `add_conditional_edges` for state-based routing, then
//! `compile()` to get an executable `CompiledStateGraph`. Runs are cancelled
//! cooperatively via a `CancellationToken` checked between nodes.

mod compile_error;
mod compiled;
mod conditional;
mod logging;
mod next;
mod node;
mod state_graph;

pub use compile_error::CompilationError;
pub use compiled::CompiledStateGraph;
pub use conditional::{ConditionalRouter, ConditionalRouterFn, NextEntry};
pub use logging::{
    log_graph_cancelled, log_graph_complete, log_graph_error, log_graph_start, log_node_complete,
    log_node_start, log_routing,
};
pub use next::Next;
pub use node::Node;
pub use state_graph::{StateGraph, END, START};
