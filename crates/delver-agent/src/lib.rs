//! The research workflow.
//!
//! A turn is one run of a small state graph: the classifier labels the query,
//! the router picks a branch (research, follow-up or general) and each node
//! mutates a shared [`ResearchState`] until a terminal node is reached. The
//! caller reads `response` from the final state.

pub mod extract;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod state;
pub mod workflow;

pub use graph::{ExecutionResult, GraphBuilder, GraphExecutor, Node, NodeRun};
pub use state::{Classification, GeneratedQueries, ResearchState, SearchBatch};
pub use workflow::{ResearchWorkflow, TurnOutcome, WorkflowOptions};
