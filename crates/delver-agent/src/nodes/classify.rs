use futures::future::BoxFuture;
use tracing::{info, warn};

use delver_core::error::Result;
use delver_core::types::ModelTier;
use delver_llm::LlmGateway;

use crate::graph::Node;
use crate::prompts;
use crate::state::{Classification, ResearchState};

/// Labels the query as research, follow-up or general.
pub struct ClassifyNode {
    llm: LlmGateway,
}

impl ClassifyNode {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }
}

impl Node<ResearchState> for ClassifyNode {
    fn run<'a>(&'a self, state: &'a mut ResearchState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let raw = self
                .llm
                .generate(
                    ModelTier::Fast,
                    &prompts::CLASSIFY,
                    &[("query", state.query()), ("chat_summary", state.chat_summary.as_str())],
                )
                .await?;

            let classification = Classification::parse(&raw);
            if let Classification::Unrecognized(label) = &classification {
                warn!(label = %label, "Unrecognized classification, treating as general");
            }
            info!(classification = classification.as_str(), "Query classified");
            state.set_classification(classification)
        })
    }
}
