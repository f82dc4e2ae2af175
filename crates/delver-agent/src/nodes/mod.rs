//! The nodes of the research graph and the router between them.

pub mod classify;
pub mod follow_up;
pub mod formulate;
pub mod general;
pub mod planner;
pub mod rerank;
pub mod search;
pub mod summarize;

pub use classify::ClassifyNode;
pub use follow_up::FollowUpNode;
pub use formulate::FormulateNode;
pub use general::GeneralNode;
pub use planner::PlannerNode;
pub use rerank::RerankNode;
pub use search::SearchNode;
pub use summarize::SummarizeNode;

use crate::state::{Classification, ResearchState};

pub const CLASSIFY: &str = "classify";
pub const PLANNER: &str = "planner";
pub const SEARCH: &str = "search";
pub const RERANK: &str = "rerank";
pub const FORMULATE: &str = "formulate";
pub const GENERAL: &str = "general";
pub const FOLLOW_UP: &str = "follow_up";
pub const SUMMARIZE: &str = "summarize";

/// Route label for the classifier's decision. Anything that isn't research
/// or a follow-up, including a missing classification, is general.
pub fn route(state: &ResearchState) -> String {
    match state.classification() {
        Some(Classification::Research) => "research",
        Some(Classification::FollowUp) => "follow-up",
        _ => "general",
    }
    .to_string()
}
