use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use delver_core::error::{DelverError, Result};
use delver_core::traits::SearchProvider;
use delver_core::types::SearchHit;

/// A search provider that returns canned hits and records every query.
///
/// Queries without explicit hits get two generated results whose URLs are
/// derived from the query text.
#[derive(Clone, Default)]
pub struct MockSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    failing: HashSet<String>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl SearchProvider for MockSearch {
    fn name(&self) -> &str {
        "mock"
    }

    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        let query = query.to_string();
        Box::pin(async move {
            self.queries.lock().unwrap().push(query.clone());

            if self.failing.contains(&query) {
                return Err(DelverError::Search {
                    provider: "mock".into(),
                    message: format!("HTTP 500 for '{}'", query),
                });
            }

            Ok(self
                .hits
                .get(&query)
                .cloned()
                .unwrap_or_else(|| crate::fixtures::hits_for(&query, 2)))
        })
    }
}
