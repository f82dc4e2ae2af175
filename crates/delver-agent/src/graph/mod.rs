//! State graph execution.
//!
//! A graph is a table of named [`Node`]s and one outgoing [`Edge`] per
//! non-terminal node. Edges are either a fixed successor or a selector that
//! inspects the state and returns a route label. The [`GraphExecutor`] walks
//! the table from the entry point, awaiting each node in turn and handing it
//! the state by mutable reference, until it reaches a node with no edge.

pub mod edge;
pub mod executor;
pub mod node;

pub use edge::Edge;
pub use executor::{ExecutionResult, GraphBuilder, GraphExecutor, NodeRun};
pub use node::Node;
