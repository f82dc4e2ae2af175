pub mod gemini;
pub mod openai;
pub mod presets;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
