//! Grounded generation event types.

use crate::types::RetrievedPassage;
use pdfchat_core::AppResult;
use serde::{Deserialize, Serialize};

/// Server-sent event payload that terminates a successful answer stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A candidate source shown to the caller before the answer streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Rank-local citation id used by `[n]` markers
    pub id: u32,

    /// Source document file name
    pub source: String,

    /// Source page
    pub page: u32,

    /// Passage text
    pub content: String,
}

impl From<&RetrievedPassage> for Citation {
    fn from(passage: &RetrievedPassage) -> Self {
        Self {
            id: passage.citation_id,
            source: passage.source_filename.clone(),
            page: passage.source_page,
            content: passage.text.clone(),
        }
    }
}

/// One event of a grounded answer stream.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Full candidate set, always first
    Citations(Vec<Citation>),

    /// Reconciled answer text
    Text(String),

    /// The answer completed normally
    Done,
}

#[derive(Serialize)]
struct CitationsPayload<'a> {
    citations: &'a [Citation],
}

#[derive(Serialize)]
struct ChunkPayload<'a> {
    chunk: &'a str,
}

impl GenerationEvent {
    /// The `data:` payload of the server-sent event for this event.
    pub fn to_sse_data(&self) -> AppResult<String> {
        Ok(match self {
            Self::Citations(citations) => serde_json::to_string(&CitationsPayload { citations })?,
            Self::Text(chunk) => serde_json::to_string(&ChunkPayload { chunk })?,
            Self::Done => DONE_SENTINEL.to_string(),
        })
    }
}
