use futures::future::BoxFuture;
use tracing::debug;

use delver_core::error::Result;
use delver_core::types::{format_transcript, ModelTier};
use delver_llm::LlmGateway;

use crate::graph::Node;
use crate::prompts;
use crate::state::ResearchState;

/// Placeholder summary for an empty conversation or an empty model answer.
const BLANK_SUMMARY: &str = " ";

/// Condenses the prior conversation into `turn_summary`.
///
/// The result is not written into `chat_summary`; whether it seeds the next
/// turn is the caller's decision.
pub struct SummarizeNode {
    llm: LlmGateway,
}

impl SummarizeNode {
    pub fn new(llm: LlmGateway) -> Self {
        Self { llm }
    }
}

impl Node<ResearchState> for SummarizeNode {
    fn run<'a>(&'a self, state: &'a mut ResearchState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if state.chat_history.is_empty() {
                debug!("No history to summarize");
                state.turn_summary = Some(BLANK_SUMMARY.to_string());
                return Ok(());
            }

            let transcript = format_transcript(&state.chat_history);
            let summary = self
                .llm
                .generate(
                    ModelTier::Quality,
                    &prompts::SUMMARIZE,
                    &[("history", transcript.as_str())],
                )
                .await?;

            let summary = summary.trim();
            debug!(chars = summary.len(), "Conversation summarized");
            state.turn_summary = Some(if summary.is_empty() {
                BLANK_SUMMARY.to_string()
            } else {
                summary.to_string()
            });
            Ok(())
        })
    }
}
