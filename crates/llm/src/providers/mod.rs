//! Generative model provider implementations.

pub mod gemini;
pub mod mock;
pub mod ollama;

pub use gemini::GeminiClient;
pub use mock::{MockLlmClient, MockStep};
pub use ollama::OllamaClient;
