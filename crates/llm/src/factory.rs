//! Generation provider factory.
//!
//! Resolves the configured provider name into a client, injecting the API
//! credential where the provider needs one.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, MockLlmClient, OllamaClient};
use crate::types::ProviderType;
use pdfchat_core::{AppError, AppResult, LlmSettings};
use std::sync::Arc;

/// Create a generation client from settings.
///
/// # Arguments
/// * `settings` - Provider, model and endpoint
/// * `api_key` - API key (required by Gemini)
///
/// # Errors
/// Returns `AppError::Config` if:
/// - Provider is unknown
/// - Required secrets are missing
pub fn create_client(
    settings: &LlmSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider = ProviderType::parse(&settings.provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", settings.provider)))?;

    let client: Arc<dyn LlmClient> = match provider {
        ProviderType::Gemini => {
            let key = api_key.ok_or_else(|| {
                AppError::Config("Gemini provider requires API key".to_string())
            })?;
            match settings.endpoint.as_deref() {
                Some(endpoint) => Arc::new(GeminiClient::with_base_url(endpoint, key)),
                None => Arc::new(GeminiClient::new(key)),
            }
        }
        ProviderType::Ollama => match settings.endpoint.as_deref() {
            Some(endpoint) => Arc::new(OllamaClient::with_base_url(endpoint)),
            None => Arc::new(OllamaClient::new()),
        },
        ProviderType::Mock => Arc::new(MockLlmClient::default()),
    };

    tracing::debug!(
        provider = client.provider_name(),
        model = %settings.model,
        "Created generation client"
    );

    Ok(client)
}
