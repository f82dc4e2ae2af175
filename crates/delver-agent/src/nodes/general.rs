use futures::future::BoxFuture;

use delver_core::error::Result;
use delver_core::types::ModelTier;
use delver_llm::LlmGateway;

use crate::graph::Node;
use crate::prompts;
use crate::state::ResearchState;

/// Answers small talk and questions that need no research.
pub struct GeneralNode {
    llm: LlmGateway,
}

impl GeneralNode {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }
}

impl Node<ResearchState> for GeneralNode {
    fn run<'a>(&'a self, state: &'a mut ResearchState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let answer = self
                .llm
                .generate(
                    ModelTier::Fast,
                    &prompts::GENERAL,
                    &[("query", state.query()), ("chat_summary", state.chat_summary.as_str())],
                )
                .await?;
            state.response = Some(answer);
            Ok(())
        })
    }
}
