//! Text embeddings.
//!
//! Providers map text to fixed-length vectors. The embedding space
//! (provider, model, dimensions) is recorded with every index so vectors from
//! different models are never mixed.

pub mod provider;
pub mod providers;
pub mod space;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{GeminiEmbeddingProvider, MockProvider, OllamaProvider};
pub use space::EmbeddingSpace;
