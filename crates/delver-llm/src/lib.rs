pub mod gateway;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod streaming;

use delver_core::config::ModelConfig;
use delver_core::error::{DelverError, Result};
use delver_core::traits::LlmClient;

pub use gateway::LlmGateway;
pub use prompt::PromptTemplate;
pub use providers::gemini::GeminiClient;
pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client based on the provider name.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "gemini" | "google" => Ok(Box::new(GeminiClient::new())),
        "openai" => Ok(Box::new(OpenAiClient::new())),
        // Named presets and anything with an explicit endpoint speak the OpenAI protocol
        p if providers::presets::get_preset(p).is_some() || config.base_url.is_some() => {
            Ok(Box::new(OpenAiClient::new()))
        }
        other => Err(DelverError::UnsupportedProvider(other.to_string())),
    }
}
