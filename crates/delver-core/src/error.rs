use thiserror::Error;

#[derive(Debug, Error)]
pub enum DelverError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    #[error("Prompt template error: {0}")]
    Prompt(String),

    // Retrieval errors
    #[error("Search failed: {provider}: {message}")]
    Search { provider: String, message: String },

    #[error("Fetch failed: {url}: {message}")]
    Fetch { url: String, message: String },

    // Orchestration errors
    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: Box<DelverError>,
    },

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DelverError {
    /// Wrap an error raised inside a graph node with the node's id.
    pub fn in_node(node: impl Into<String>, source: DelverError) -> Self {
        match source {
            // Keep the innermost node id when errors bubble through nested graphs.
            already @ DelverError::Node { .. } => already,
            other => DelverError::Node {
                node: node.into(),
                source: Box::new(other),
            },
        }
    }

    /// Whether a failed LLM call is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            DelverError::LlmRequest(msg) => {
                msg.contains("429")
                    || msg.contains("500")
                    || msg.contains("502")
                    || msg.contains("503")
                    || msg.contains("timeout")
                    || msg.contains("connection")
            }
            DelverError::LlmStream(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DelverError>;
