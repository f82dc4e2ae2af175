use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info};

use delver_core::error::Result;
use delver_core::traits::DocumentFetcher;
use delver_core::types::ModelTier;
use delver_llm::LlmGateway;

use crate::extract::extract_ranked_docs;
use crate::graph::Node;
use crate::prompts;
use crate::state::ResearchState;

/// Fetches the reranked sources and writes the research report.
pub struct FormulateNode {
    llm: LlmGateway,
    fetcher: Arc<dyn DocumentFetcher>,
    max_chars_per_document: usize,
}

impl FormulateNode {
    pub fn new(
        llm: LlmGateway,
        fetcher: Arc<dyn DocumentFetcher>,
        max_chars_per_document: usize,
    ) -> Self {
        Self {
            llm,
            fetcher,
            max_chars_per_document,
        }
    }

    /// Fetch every candidate URL in order, keeping the ones that produced text.
    async fn gather(&self, reranked: &str) -> Vec<(String, String)> {
        let mut fetched = Vec::new();

        for doc in extract_ranked_docs(reranked) {
            let Some(url) = doc.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
            else {
                continue;
            };

            let outcome = self.fetcher.fetch(&url).await;
            match outcome.text() {
                Some(text) => {
                    let text = truncate_chars(text, self.max_chars_per_document).to_string();
                    fetched.push((url, text));
                }
                None => debug!(url = %url, reason = outcome.as_str(), "Skipping source"),
            }
        }

        fetched
    }
}

/// The longest prefix of `text` with at most `max` chars.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn aggregate(sources: &[(String, String)]) -> String {
    sources
        .iter()
        .map(|(url, text)| format!("Source: {}\n{}", url, text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl Node<ResearchState> for FormulateNode {
    fn run<'a>(&'a self, state: &'a mut ResearchState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let sources = self.gather(&state.reranked_docs).await;
            info!(sources = sources.len(), "Sources fetched");

            let content = if sources.is_empty() {
                prompts::NO_CONTENT.to_string()
            } else {
                aggregate(&sources)
            };

            let report = self
                .llm
                .generate(
                    ModelTier::Quality,
                    &prompts::FORMULATE,
                    &[
                        ("query", state.query()),
                        ("chat_summary", state.chat_summary.as_str()),
                        ("content", content.as_str()),
                    ],
                )
                .await?;

            state.response = Some(report.clone());
            state.research_result = Some(report);
            Ok(())
        })
    }
}
