use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use delver_core::traits::DocumentFetcher;
use delver_core::types::FetchOutcome;

/// A document fetcher backed by a URL map. Unknown URLs come back as a 404
/// error outcome.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: HashMap<String, FetchOutcome>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, text: &str) -> Self {
        self.pages
            .insert(url.to_string(), FetchOutcome::Text(text.to_string()));
        self
    }

    pub fn with_error(mut self, url: &str, message: &str) -> Self {
        self.pages
            .insert(url.to_string(), FetchOutcome::Error(message.to_string()));
        self
    }

    /// URLs fetched so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl DocumentFetcher for MockFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'_, FetchOutcome> {
        let url = url.to_string();
        Box::pin(async move {
            self.requested.lock().unwrap().push(url.clone());
            self.pages
                .get(&url)
                .cloned()
                .unwrap_or_else(|| FetchOutcome::Error("HTTP Error 404: Not Found".into()))
        })
    }
}
