use futures::future::BoxFuture;
use tracing::debug;

use delver_core::error::Result;
use delver_core::types::ModelTier;
use delver_llm::LlmGateway;

use crate::graph::Node;
use crate::prompts;
use crate::state::{GeneratedQueries, ResearchState};

/// Asks for five search queries. The answer is stored raw; the search node
/// decodes it.
pub struct PlannerNode {
    llm: LlmGateway,
}

impl PlannerNode {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }
}

impl Node<ResearchState> for PlannerNode {
    fn run<'a>(&'a self, state: &'a mut ResearchState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let raw = self
                .llm
                .generate(
                    ModelTier::Fast,
                    &prompts::PLANNER,
                    &[("query", state.query()), ("chat_summary", state.chat_summary.as_str())],
                )
                .await?;

            debug!(raw = %raw, "Planner output");
            state.generated_queries = GeneratedQueries::Raw(raw);
            Ok(())
        })
    }
}
