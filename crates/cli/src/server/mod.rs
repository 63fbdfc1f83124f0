//! HTTP API.
//!
//! - `POST /process-docs` indexes the source directory
//! - `POST /chat` streams a grounded answer as server-sent events
//! - `GET /health` reports liveness and the index size

mod error;
mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use pdfchat_core::{AppError, AppResult};
use pdfchat_knowledge::KnowledgeBase;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    kb: Arc<KnowledgeBase>,
    /// Serializes indexing runs; chat requests never take it
    indexing: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            kb: Arc::new(kb),
            indexing: Arc::new(Mutex::new(())),
        }
    }
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/process-docs", post(routes::process_docs))
        .route("/chat", post(routes::chat))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serve the API until the process is stopped.
pub async fn serve(kb: KnowledgeBase, host: &str, port: u16) -> AppResult<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid address {}:{}: {}", host, port, e)))?;

    let app = router(AppState::new(kb));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Serving on http://{}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Other(format!("Server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use pdfchat_core::AppConfig;
    use pdfchat_knowledge::embeddings::MockProvider;
    use pdfchat_knowledge::{InMemoryIndex, PdfExtractor};
    use pdfchat_llm::{MockLlmClient, MockStep};
    use serde_json::Value;
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app_with(workspace: &Path, llm: MockLlmClient) -> Router {
        let mut config = AppConfig {
            workspace: workspace.to_path_buf(),
            ..AppConfig::default()
        };
        config.llm.provider = "mock".to_string();
        config.embedding.provider = "mock".to_string();
        config.embedding.dimensions = 64;

        let kb = KnowledgeBase::from_parts(
            &config,
            Arc::new(PdfExtractor::new()),
            Arc::new(MockProvider::new(64)),
            Arc::new(InMemoryIndex::new()),
            Arc::new(llm),
        )
        .unwrap();
        router(AppState::new(kb))
    }

    fn app(workspace: &Path) -> Router {
        app_with(workspace, MockLlmClient::default())
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_chat_without_message_is_bad_request() {
        let temp = TempDir::new().unwrap();

        for body in ["{}", "", "{\"message\": \"   \"}", "not json"] {
            let response = app(temp.path()).oneshot(post("/chat", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(
                body_json(response).await,
                serde_json::json!({ "error": "No message provided" })
            );
        }
    }

    #[tokio::test]
    async fn test_chat_with_oversized_k_is_bad_request() {
        let temp = TempDir::new().unwrap();
        let body = format!(r#"{{"message": "roof?", "k": {}}}"#, usize::MAX);
        let response = app(temp.path()).oneshot(post("/chat", &body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn test_chat_streams_citations_text_and_done() {
        let temp = TempDir::new().unwrap();
        let response = app(temp.path())
            .oneshot(post("/chat", r#"{"message": "When was the roof replaced?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let body = body_string(response).await;
        let events: Vec<&str> = body
            .split("\n\n")
            .filter(|e| !e.is_empty())
            .collect();

        assert_eq!(events.first(), Some(&r#"data: {"citations":[]}"#));
        assert_eq!(events.last(), Some(&"data: [DONE]"));
        assert!(events[1..events.len() - 1]
            .iter()
            .all(|e| e.starts_with(r#"data: {"chunk":"#)));
    }

    #[tokio::test]
    async fn test_chat_generation_failure_is_server_error() {
        let temp = TempDir::new().unwrap();
        let response = app_with(temp.path(), MockLlmClient::failing("quota exceeded"))
            .oneshot(post("/chat", r#"{"message": "roof?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_chat_mid_stream_failure_ends_without_done() {
        let temp = TempDir::new().unwrap();
        let llm = MockLlmClient::with_steps([
            MockStep::Text("Hello ".to_string()),
            MockStep::Fail("connection reset".to_string()),
        ]);
        let response = app_with(temp.path(), llm)
            .oneshot(post("/chat", r#"{"message": "roof?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains(r#"data: {"chunk":"Hello "}"#));
        assert!(body.contains(r#"data: {"error":"#));
        assert!(!body.contains("[DONE]"));
    }

    #[tokio::test]
    async fn test_process_docs_on_empty_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("data/source_files")).unwrap();

        for body in ["", r#"{"overwrite": true}"#] {
            let response = app(temp.path())
                .oneshot(post("/process-docs", body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = body_json(response).await;
            assert_eq!(body["message"], "Documents processed successfully");
            assert_eq!(body["documents_processed"], 0);
            assert_eq!(body["chunks_created"], 0);
            assert_eq!(body["failures"], serde_json::json!([]));
        }
    }

    #[tokio::test]
    async fn test_process_docs_reports_unreadable_pdf() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("data/source_files");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(source.join("broken.pdf"), b"not a pdf").unwrap();

        let response = app(temp.path())
            .oneshot(post("/process-docs", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["documents_processed"], 0);
        assert_eq!(body["failures"][0]["filename"], "broken.pdf");
        assert_eq!(body["failures"][0]["stage"], "extraction");
    }

    #[tokio::test]
    async fn test_health_reports_record_count() {
        let temp = TempDir::new().unwrap();
        let response = app(temp.path())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["records"], 0);
    }
}
