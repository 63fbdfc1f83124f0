//! Embedding provider implementations.

pub mod gemini;
pub mod mock;
pub mod ollama;

pub use gemini::GeminiEmbeddingProvider;
pub use mock::MockProvider;
pub use ollama::OllamaProvider;

use pdfchat_core::{AppError, AppResult};
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;

/// Maximum retry attempts after the first failed request
pub(crate) const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Request timeout in seconds
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Failure of a single embedding request.
#[derive(Debug)]
pub(crate) enum RequestFailure {
    /// Connection errors, rate limiting and server errors
    Transient(String),
    /// Errors a retry cannot fix
    Permanent(String),
}

impl RequestFailure {
    /// Classify a non-success HTTP response.
    pub(crate) fn from_status(status: StatusCode, message: String) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Transient(message)
        } else {
            Self::Permanent(message)
        }
    }
}

/// Run `attempt` until it succeeds, retrying transient failures with
/// exponential backoff.
pub(crate) async fn with_retries<T, F, Fut>(provider: &str, mut attempt: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RequestFailure>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(RequestFailure::Permanent(message)) => return Err(AppError::Embedding(message)),
            Err(RequestFailure::Transient(message)) if retries >= MAX_RETRIES => {
                return Err(AppError::Embedding(format!(
                    "{} (gave up after {} attempts)",
                    message,
                    retries + 1
                )))
            }
            Err(RequestFailure::Transient(message)) => {
                let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(retries);
                retries += 1;
                tracing::warn!(
                    provider,
                    attempt = retries,
                    backoff_ms,
                    "Embedding request failed, retrying: {}",
                    message
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}
