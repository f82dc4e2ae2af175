use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use delver_core::error::Result;
use delver_core::traits::SearchProvider;

use crate::extract::decode_string_list;
use crate::graph::Node;
use crate::state::{GeneratedQueries, ResearchState, SearchBatch};

/// Decodes the planner's queries and runs each one against the search
/// provider. A failing query leaves an empty batch carrying the error.
pub struct SearchNode {
    search: Arc<dyn SearchProvider>,
}

impl SearchNode {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }
}

impl Node<ResearchState> for SearchNode {
    fn run<'a>(&'a self, state: &'a mut ResearchState) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let queries = match std::mem::take(&mut state.generated_queries) {
                GeneratedQueries::Raw(raw) => decode_string_list(&raw),
                GeneratedQueries::Decoded(list) => list,
            };
            state.generated_queries = GeneratedQueries::Decoded(queries.clone());

            info!(provider = self.search.name(), queries = queries.len(), "Searching");

            for query in queries {
                match self.search.search(&query).await {
                    Ok(hits) => state.push_batch(SearchBatch::ok(query, hits)),
                    Err(e) => {
                        warn!(query = %query, error = %e, "Search failed for query");
                        state.push_batch(SearchBatch::failed(query, e.to_string()));
                    }
                }
            }

            Ok(())
        })
    }
}
