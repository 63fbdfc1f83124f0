//! Scripted generation provider.
//!
//! Replays a fixed sequence of fragments and failures. Used by tests and by
//! the `mock` provider for runs without network access.

use crate::client::{LlmClient, LlmRequest, LlmStream, LlmStreamChunk};
use pdfchat_core::{AppError, AppResult};
use std::sync::Mutex;

/// One step of a scripted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStep {
    /// Emit a text fragment
    Text(String),
    /// Fail the stream with a generation error
    Fail(String),
}

/// Generation client that replays a script.
#[derive(Debug)]
pub struct MockLlmClient {
    steps: Vec<MockStep>,
    open_error: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    /// Stream the given fragments, then finish normally.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_steps(fragments.into_iter().map(|f| MockStep::Text(f.into())))
    }

    /// Replay an arbitrary script of fragments and failures.
    pub fn with_steps(steps: impl IntoIterator<Item = MockStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            open_error: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A client whose requests fail before any text is produced.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            steps: Vec::new(),
            open_error: Some(message.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: &LlmRequest) -> AppResult<()> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        match &self.open_error {
            Some(message) => Err(AppError::Generation(message.clone())),
            None => Ok(()),
        }
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new([
            "Here is what the documents say ",
            "about your question [1].",
        ])
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.record(request)?;

        let mut items: Vec<AppResult<LlmStreamChunk>> = Vec::new();
        let mut failed = false;
        for step in &self.steps {
            match step {
                MockStep::Text(text) => items.push(Ok(LlmStreamChunk::text(text.clone()))),
                MockStep::Fail(message) => {
                    items.push(Err(AppError::Generation(message.clone())));
                    failed = true;
                    break;
                }
            }
        }
        if !failed {
            items.push(Ok(LlmStreamChunk::finished(None)));
        }

        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_stream_replays_fragments_then_finishes() {
        let client = MockLlmClient::new(["a", "b"]);
        let chunks: Vec<_> = client
            .stream(&LlmRequest::new("q", "mock"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].as_ref().unwrap().content, "a");
        assert!(chunks[2].as_ref().unwrap().done);
        assert_eq!(client.prompts(), vec!["q".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_stops_at_failure() {
        let client = MockLlmClient::with_steps([
            MockStep::Text("a".to_string()),
            MockStep::Fail("upstream reset".to_string()),
            MockStep::Text("never".to_string()),
        ]);
        let chunks: Vec<_> = client
            .stream(&LlmRequest::new("q", "mock"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_err());
    }

    #[tokio::test]
    async fn test_failing_client_fails_on_open() {
        let client = MockLlmClient::failing("quota exceeded");
        let result = client.stream(&LlmRequest::new("q", "mock")).await;
        assert!(matches!(result, Err(AppError::Generation(_))));
    }

}
