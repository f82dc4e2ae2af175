use std::path::PathBuf;
use std::sync::Arc;

use delver_core::config::{AppConfig, ModelConfig};
use delver_core::types::{ChatMessage, SearchHit};
use delver_llm::LlmGateway;

use crate::mock_llm::ScriptedLlm;

/// A gateway that serves both tiers from `llm`.
pub fn scripted_gateway(llm: &ScriptedLlm) -> LlmGateway {
    LlmGateway::single(Arc::new(llm.clone()), ModelConfig::new("mock", "scripted"))
}

/// `count` deterministic hits for a query.
pub fn hits_for(query: &str, count: usize) -> Vec<SearchHit> {
    let slug: String = query
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    (1..=count)
        .map(|i| SearchHit {
            title: format!("{} result {}", query, i),
            url: format!("https://example.com/{}/{}", slug, i),
            snippet: format!("Snippet {} about {}", i, query),
        })
        .collect()
}

/// A short user/assistant exchange.
pub fn sample_history() -> Vec<ChatMessage> {
    vec![
        ChatMessage::user("Tell me about Rust async runtimes"),
        ChatMessage::assistant("Tokio and async-std are the most common ones."),
    ]
}

/// A complete config as TOML, with no secrets.
pub fn sample_config_toml() -> &'static str {
    r#"
[models.fast]
provider = "groq"
model_id = "llama-3.3-70b-versatile"
api_key = "test-groq"

[models.quality]
provider = "gemini"
model_id = "gemini-2.0-flash"
api_key = "test-gemini"

[search]
provider = "serper"
api_key = "test-serper"
"#
}

/// Parse [`sample_config_toml`].
pub fn sample_config() -> AppConfig {
    toml::from_str(sample_config_toml()).expect("sample config parses")
}

/// Write `contents` to a file in a fresh temp dir. Keep the dir alive for
/// as long as the path is used.
pub fn write_temp_file(name: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write temp file");
    (dir, path)
}
