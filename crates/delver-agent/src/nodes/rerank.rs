use futures::future::BoxFuture;
use tracing::debug;

use delver_core::error::Result;
use delver_core::types::ModelTier;
use delver_llm::LlmGateway;

use crate::graph::Node;
use crate::prompts;
use crate::state::ResearchState;

/// Has the model filter and rank the search results. The answer is kept
/// verbatim; the formulator extracts the array from it.
pub struct RerankNode {
    llm: LlmGateway,
}

impl RerankNode {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }
}

impl Node<ResearchState> for RerankNode {
    fn run<'a>(&'a self, state: &'a mut ResearchState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let documents = serde_json::to_string_pretty(state.retrieved_docs())?;
            debug!(batches = state.retrieved_docs().len(), chars = documents.len(), "Reranking");

            let reranked = self
                .llm
                .generate(
                    ModelTier::Quality,
                    &prompts::RERANK,
                    &[
                        ("query", state.query()),
                        ("chat_summary", state.chat_summary.as_str()),
                        ("documents", documents.as_str()),
                    ],
                )
                .await?;

            state.reranked_docs = reranked;
            Ok(())
        })
    }
}
