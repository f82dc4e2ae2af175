use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// Streaming text generation against one provider.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Web search backend.
pub trait SearchProvider: Send + Sync + 'static {
    /// Provider name (e.g., "serper", "tavily").
    fn name(&self) -> &str;

    /// Run one query and return its organic results in provider order.
    fn search(&self, query: &str) -> BoxFuture<'_, Result<Vec<SearchHit>>>;
}

/// Turns a URL into plain text.
pub trait DocumentFetcher: Send + Sync + 'static {
    /// Fetch and extract a document. Never fails; errors come back as
    /// `FetchOutcome::Error`.
    fn fetch(&self, url: &str) -> BoxFuture<'_, FetchOutcome>;
}

/// Conversation persistence backend.
pub trait SessionStore: Send + Sync + 'static {
    /// Append messages to a session.
    fn append_messages(&self, sid: &SessionId, msgs: &[ChatMessage]) -> BoxFuture<'_, Result<()>>;

    /// Load message history for a session, oldest first.
    fn load_history(&self, sid: &SessionId, limit: usize)
        -> BoxFuture<'_, Result<Vec<ChatMessage>>>;

    /// Latest stored conversation summary for a session.
    fn load_summary(&self, sid: &SessionId) -> BoxFuture<'_, Result<Option<String>>>;

    /// Replace the stored conversation summary for a session.
    fn save_summary(&self, sid: &SessionId, summary: &str) -> BoxFuture<'_, Result<()>>;
}
