//! Embedding provider trait and factory.

use super::providers::{GeminiEmbeddingProvider, MockProvider, OllamaProvider};
use pdfchat_core::{AppError, AppResult, EmbeddingSettings};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "mock", "gemini", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    ///
    /// Returns one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// # Errors
/// Returns `AppError::Config` for an unknown provider or a missing API key.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match settings.provider.as_str() {
        "mock" => Arc::new(MockProvider::new(settings.dimensions)),

        "ollama" => Arc::new(OllamaProvider::new(
            settings.endpoint.as_deref(),
            &settings.model,
            settings.dimensions,
        )?),

        "gemini" => {
            let key = api_key.ok_or_else(|| {
                AppError::Config("Gemini embedding provider requires API key".to_string())
            })?;
            Arc::new(GeminiEmbeddingProvider::new(
                settings.endpoint.as_deref(),
                key,
                &settings.model,
                settings.dimensions,
            )?)
        }

        _ => {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: '{}'. Supported providers: gemini, ollama, mock",
                settings.provider
            )))
        }
    };

    tracing::debug!(
        provider = provider.provider_name(),
        model = provider.model_name(),
        dimensions = provider.dimensions(),
        "Created embedding provider"
    );

    Ok(provider)
}

/// Check that a provider returned one vector per input, each of the expected size.
pub(crate) fn check_vectors(
    provider: &dyn EmbeddingProvider,
    inputs: usize,
    vectors: &[Vec<f32>],
) -> AppResult<()> {
    if vectors.len() != inputs {
        return Err(AppError::Embedding(format!(
            "{} returned {} embeddings for {} inputs",
            provider.provider_name(),
            vectors.len(),
            inputs
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != provider.dimensions()) {
        return Err(AppError::Embedding(format!(
            "Unexpected embedding dimensions from {}: got {}, expected {}",
            provider.model_name(),
            bad.len(),
            provider.dimensions()
        )));
    }
    Ok(())
}
