pub mod gemini_client;
pub mod openrouter_client;

pub use gemini_client::GeminiClient;
pub use openrouter_client::OpenRouterClient;
