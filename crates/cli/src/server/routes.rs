//! Route handlers.

use super::error::ApiError;
use super::AppState;
use axum::{
    body::Bytes,
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use pdfchat_core::AppResult;
use pdfchat_knowledge::{DocumentFailure, GenerationEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;

#[derive(Debug, Default, Deserialize)]
pub struct ProcessDocsRequest {
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Serialize)]
pub struct ProcessDocsResponse {
    pub message: String,
    pub documents_processed: usize,
    pub chunks_created: usize,
    pub failures: Vec<DocumentFailure>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,

    /// Passages to retrieve, defaulting to the configured top-k
    #[serde(default)]
    pub k: Option<usize>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.kb.stats().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "records": stats.records,
    })))
}

/// POST /process-docs - index the source directory
///
/// The body is optional; `overwrite` defaults to false.
pub async fn process_docs(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ProcessDocsResponse>, ApiError> {
    let request: ProcessDocsRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessDocsRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?
    };

    let _guard = state.indexing.lock().await;
    tracing::info!(overwrite = request.overwrite, "Processing documents");

    let report = state.kb.build(request.overwrite).await?;

    Ok(Json(ProcessDocsResponse {
        message: "Documents processed successfully".to_string(),
        documents_processed: report.documents_processed,
        chunks_created: report.chunks_created,
        failures: report.failures,
    }))
}

/// POST /chat - stream a grounded answer
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request: Option<ChatRequest> = serde_json::from_slice(&body).ok();
    let (message, k) = match request {
        Some(ChatRequest {
            message: Some(message),
            k,
        }) if !message.trim().is_empty() => (message, k),
        _ => return Err(ApiError::bad_request("No message provided")),
    };

    tracing::info!("Chat: \"{}\"", message);

    let retrieval = state.kb.retrieve(&message, k).await?;
    let stream = state.kb.generate(&message, &retrieval).await?;

    let events = stream.map(|event| Ok::<_, Infallible>(to_sse(event)));
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

fn to_sse(event: AppResult<GenerationEvent>) -> Event {
    let data = match event {
        Ok(event) => event.to_sse_data(),
        Err(e) => {
            tracing::warn!("Answer stream ended early: {}", e);
            Ok(json!({ "error": e.to_string() }).to_string())
        }
    };

    match data {
        Ok(data) => Event::default().data(data),
        Err(e) => Event::default().data(json!({ "error": e.to_string() }).to_string()),
    }
}
