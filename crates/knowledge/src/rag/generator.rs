//! Grounded answer generation.
//!
//! Builds one citation-aware prompt from a retrieval result, streams the
//! model's answer and reconciles its citations on the way out. Events are
//! produced by a background task and handed over through a bounded channel,
//! so a slow consumer slows the upstream read and a dropped consumer stops
//! it.

use crate::rag::citations::CitationReconciler;
use crate::rag::types::{Citation, GenerationEvent};
use crate::types::RetrievalResult;
use futures::{Stream, StreamExt};
use pdfchat_core::{AppError, AppResult, LlmSettings};
use pdfchat_llm::{LlmClient, LlmRequest, LlmStream, LlmStreamChunk};
use pdfchat_prompt::{build_prompt, builtin_prompt, resolve_prompt, PromptSource, GROUNDED_ANSWER_PROMPT};
use serde_json::json;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Events buffered between the generation task and its consumer.
const EVENT_BUFFER: usize = 32;

/// Streams grounded answers from a generative model.
#[derive(Clone)]
pub struct GroundedGenerator {
    llm: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    prompts_dir: Option<PathBuf>,
}

impl std::fmt::Debug for GroundedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundedGenerator")
            .field("provider", &self.llm.provider_name())
            .field("model", &self.model)
            .field("prompts_dir", &self.prompts_dir)
            .finish()
    }
}

impl GroundedGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, settings: &LlmSettings) -> Self {
        Self {
            llm,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            prompts_dir: None,
        }
    }

    /// Look for a prompt override in `dir` before using the built-in prompt.
    pub fn with_prompts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompts_dir = Some(dir.into());
        self
    }

    /// Build the model request for a query and its retrieved passages.
    pub fn build_request(&self, query: &str, retrieval: &RetrievalResult) -> AppResult<LlmRequest> {
        let (definition, source) = match &self.prompts_dir {
            Some(dir) => resolve_prompt(dir, GROUNDED_ANSWER_PROMPT)?,
            None => (builtin_prompt(GROUNDED_ANSWER_PROMPT)?, PromptSource::Builtin),
        };
        tracing::debug!(prompt = %definition.id, ?source, "Resolved answer prompt");

        let passages: Vec<Citation> = retrieval.passages.iter().map(Citation::from).collect();
        let built = build_prompt(
            &definition,
            &json!({
                "question": query,
                "passages": passages,
            }),
        )?;

        let mut request = LlmRequest::new(built.user, self.model.as_str());
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        Ok(request)
    }

    /// Start streaming a grounded answer.
    ///
    /// The stream yields the citation manifest first, then answer text, then
    /// `Done`. Failing to get the first piece of the answer fails the call
    /// itself. A later failure ends the stream with an error and no `Done`.
    pub async fn generate(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
    ) -> AppResult<GenerationStream> {
        let request = self.build_request(query, retrieval)?;

        tracing::info!(
            provider = self.llm.provider_name(),
            model = %self.model,
            passages = retrieval.len(),
            "Generating grounded answer"
        );

        let mut upstream = self.llm.stream(&request).await.map_err(generation_error)?;
        let first = match upstream.next().await {
            Some(Err(e)) => return Err(generation_error(e)),
            other => other,
        };

        let citations = retrieval.passages.iter().map(Citation::from).collect();
        let reconciler = CitationReconciler::new(retrieval);
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(pump(first, upstream, reconciler, citations, tx));

        Ok(GenerationStream { events: rx, task })
    }
}

/// Events of one grounded answer.
///
/// Dropping the stream cancels the generation task.
#[derive(Debug)]
pub struct GenerationStream {
    events: mpsc::Receiver<AppResult<GenerationEvent>>,
    task: JoinHandle<()>,
}

impl GenerationStream {
    /// Stop generating. Events already buffered are still delivered.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Stream for GenerationStream {
    type Item = AppResult<GenerationEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn pump(
    first: Option<AppResult<LlmStreamChunk>>,
    mut upstream: LlmStream,
    mut reconciler: CitationReconciler,
    citations: Vec<Citation>,
    tx: mpsc::Sender<AppResult<GenerationEvent>>,
) {
    if tx.send(Ok(GenerationEvent::Citations(citations))).await.is_err() {
        return;
    }

    let mut fragments = 0usize;
    let mut next = first;
    while let Some(item) = next.take() {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(fragments, "Answer stream failed: {}", e);
                let held = reconciler.flush_partial();
                if !held.is_empty() && tx.send(Ok(GenerationEvent::Text(held))).await.is_err() {
                    return;
                }
                let _ = tx.send(Err(generation_error(e))).await;
                return;
            }
        };

        if !chunk.content.is_empty() {
            fragments += 1;
            let text = reconciler.push(&chunk.content);
            if !text.is_empty() && tx.send(Ok(GenerationEvent::Text(text))).await.is_err() {
                return;
            }
        }
        if chunk.done {
            break;
        }

        next = tokio::select! {
            _ = tx.closed() => {
                tracing::debug!(fragments, "Answer consumer went away");
                return;
            }
            item = upstream.next() => item,
        };
    }

    let tail = reconciler.finish();
    if !tail.is_empty() && tx.send(Ok(GenerationEvent::Text(tail))).await.is_err() {
        return;
    }
    let _ = tx.send(Ok(GenerationEvent::Done)).await;
    tracing::debug!(fragments, "Answer complete");
}

fn generation_error(error: AppError) -> AppError {
    match error {
        AppError::Generation(_) => error,
        other => AppError::Generation(other.to_string()),
    }
}
