//! Generative model integration for pdfchat.
//!
//! This crate provides a provider-agnostic abstraction over large language
//! models. Answers are always streamed, so every provider implements an
//! incremental stream of text fragments.
//!
//! # Providers
//! - **Gemini**: Google Generative Language API (default)
//! - **Ollama**: Local LLM runtime
//! - **Mock**: Scripted fragments for tests and offline runs
//!
//! # Example
//! ```no_run
//! use futures::StreamExt;
//! use pdfchat_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let mut stream = client.stream(&request).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod lines;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::{GeminiClient, MockLlmClient, MockStep, OllamaClient};
pub use types::ProviderType;
