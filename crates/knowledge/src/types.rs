//! Knowledge pipeline type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One page of extracted document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub page_number: u32,

    /// Raw extracted text
    pub raw_text: String,
}

/// A source document after text extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// File name, unique within the corpus
    pub filename: String,

    /// Pages in document order
    pub pages: Vec<Page>,
}

/// Separator placed between pages when a document is concatenated.
pub const PAGE_SEPARATOR: &str = "\n\n";

impl ExtractedDocument {
    /// Build a document from page texts numbered from 1.
    pub fn from_pages<I, S>(filename: impl Into<String>, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filename: filename.into(),
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, text)| Page {
                    page_number: i as u32 + 1,
                    raw_text: text.into(),
                })
                .collect(),
        }
    }

    /// Concatenate page texts and record where each page starts.
    ///
    /// Offsets are character offsets into the returned text. Blank pages are
    /// skipped but keep their numbering.
    pub fn concatenate(&self) -> (String, crate::chunk::PageBoundaries) {
        let mut text = String::new();
        let mut char_len = 0usize;
        let mut starts = Vec::new();

        for page in self.pages.iter().filter(|p| !p.raw_text.trim().is_empty()) {
            if !text.is_empty() {
                text.push_str(PAGE_SEPARATOR);
                char_len += PAGE_SEPARATOR.chars().count();
            }
            starts.push((char_len, page.page_number));
            text.push_str(&page.raw_text);
            char_len += page.raw_text.chars().count();
        }

        (text, crate::chunk::PageBoundaries::new(starts))
    }
}

/// A persisted vector index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Identity assigned at indexing time
    pub id: String,

    /// Embedding of `text`
    pub vector: Vec<f32>,

    /// Chunk text
    pub text: String,

    /// Source document file name
    pub source_filename: String,

    /// Page containing the start of the chunk
    pub source_page: u32,

    /// Position of the chunk within its document
    pub position: u32,

    /// SHA-256 of the chunk text
    pub content_hash: String,

    /// When the record was written
    pub indexed_at: DateTime<Utc>,
}

/// An index record with its similarity to a query vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: IndexRecord,

    /// Cosine similarity, higher is closer
    pub score: f32,
}

/// A retrieved passage keyed by its rank within one retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Rank-local citation id, 1-based
    pub citation_id: u32,

    /// Similarity to the query
    pub score: f32,

    /// Passage text
    pub text: String,

    /// Source document file name
    pub source_filename: String,

    /// Source page
    pub source_page: u32,
}

/// Ranked passages for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The query that produced this result
    pub query: String,

    /// Passages in descending similarity, ids 1..=N
    pub passages: Vec<RetrievedPassage>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Look up a passage by citation id.
    pub fn passage(&self, citation_id: u32) -> Option<&RetrievedPassage> {
        citation_id
            .checked_sub(1)
            .and_then(|idx| self.passages.get(idx as usize))
            .filter(|p| p.citation_id == citation_id)
    }
}

/// Pipeline stage at which a document failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Extraction,
    Embedding,
}

/// A document skipped during indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub filename: String,
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of an indexing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Documents whose chunks were all persisted
    pub documents_processed: usize,

    /// Chunks persisted in this run
    pub chunks_created: usize,

    /// Documents skipped, with the reason
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DocumentFailure>,

    /// Whether the index was cleared first
    pub overwrite: bool,

    /// Wall-clock duration
    pub duration_secs: f64,
}

/// Summary of the persisted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Records currently stored
    pub records: usize,

    /// Manifest, if the index has been built at least once
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<crate::manifest::IndexManifest>,
}
