//! Google Gemini embedding provider.
//!
//! Uses the `batchEmbedContents` method of the Generative Language API, which
//! accepts up to 100 texts per request.

use super::{with_retries, RequestFailure, REQUEST_TIMEOUT_SECS};
use crate::embeddings::provider::{check_vectors, EmbeddingProvider};
use async_trait::async_trait;
use pdfchat_core::{AppError, AppResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default Generative Language API base URL.
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Largest batch the API accepts.
const MAX_BATCH: usize = 100;

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Gemini embedding provider.
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl GeminiEmbeddingProvider {
    pub fn new(
        endpoint: Option<&str>,
        api_key: &str,
        model: &str,
        dimensions: usize,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::Embedding(format!("Failed to create HTTP client for Gemini: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: endpoint
                .unwrap_or(DEFAULT_GEMINI_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
            dimensions,
        })
    }

    fn request_body<'a>(model_path: &'a str, texts: &'a [String]) -> BatchEmbedRequest<'a> {
        BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model_path,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        }
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RequestFailure> {
        let model_path = format!("models/{}", self.model);
        let url = format!("{}/{}:batchEmbedContents", self.base_url, model_path);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(&model_path, texts))
            .send()
            .await
            .map_err(|e| {
                RequestFailure::Transient(format!("Failed to send request to Gemini: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorEnvelope>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(RequestFailure::from_status(
                status,
                format!("Gemini API error ({}): {}", status, message),
            ));
        }

        let body: BatchEmbedResponse = response.json().await.map_err(|e| {
            RequestFailure::Permanent(format!("Failed to parse Gemini response: {}", e))
        })?;

        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "gemini", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH) {
            debug!("Embedding batch of {} texts", batch.len());
            let vectors = with_retries("gemini", move || self.embed_once(batch)).await?;
            check_vectors(self, batch.len(), &vectors)?;
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let texts = vec!["roof".to_string(), "gutter".to_string()];
        let body = GeminiEmbeddingProvider::request_body("models/text-embedding-004", &texts);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["requests"].as_array().unwrap().len(), 2);
        assert_eq!(json["requests"][0]["model"], "models/text-embedding-004");
        assert_eq!(json["requests"][1]["content"]["parts"][0]["text"], "gutter");
    }

    #[test]
    fn test_response_parsing() {
        let body: BatchEmbedResponse = serde_json::from_str(
            r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#,
        )
        .unwrap();
        assert_eq!(body.embeddings.len(), 2);
        assert_eq!(body.embeddings[1].values, vec![0.3, 0.4]);
    }

    #[test]
    fn test_error_envelope_parsing() {
        let err: ErrorEnvelope =
            serde_json::from_str(r#"{"error":{"code":400,"message":"API key not valid"}}"#)
                .unwrap();
        assert_eq!(err.error.message, "API key not valid");
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        let provider =
            GeminiEmbeddingProvider::new(None, "key", "models/text-embedding-004", 768).unwrap();
        assert_eq!(provider.model_name(), "text-embedding-004");
        assert_eq!(provider.base_url, DEFAULT_GEMINI_URL);
    }
}
