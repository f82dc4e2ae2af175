use futures::future::BoxFuture;

use delver_core::error::Result;
use delver_core::types::ModelTier;
use delver_llm::LlmGateway;

use crate::graph::Node;
use crate::prompts;
use crate::state::ResearchState;

/// Answers a follow-up from the chat summary alone, or says that new
/// research is needed.
pub struct FollowUpNode {
    llm: LlmGateway,
}

impl FollowUpNode {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }
}

impl Node<ResearchState> for FollowUpNode {
    fn run<'a>(&'a self, state: &'a mut ResearchState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let answer = self
                .llm
                .generate(
                    ModelTier::Quality,
                    &prompts::FOLLOW_UP,
                    &[("query", state.query()), ("chat_summary", state.chat_summary.as_str())],
                )
                .await?;
            state.response = Some(answer);
            Ok(())
        })
    }
}
