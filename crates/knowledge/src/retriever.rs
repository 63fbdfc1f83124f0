//! Query-time passage retrieval.

use crate::embeddings::{EmbeddingProvider, EmbeddingSpace};
use crate::manifest::IndexManifest;
use crate::types::{RetrievalResult, RetrievedPassage, ScoredRecord};
use crate::vector_index::VectorIndex;
use pdfchat_core::{AppError, AppResult};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::instrument;

/// Default number of passages per query.
pub const DEFAULT_TOP_K: usize = 3;

/// Candidates fetched per requested passage, so duplicates from additive
/// builds can be dropped without coming up short.
const OVERFETCH_FACTOR: usize = 2;

/// Largest number of passages a single query may ask for.
pub const MAX_TOP_K: usize = 100;

/// Embeds queries and ranks indexed passages against them.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    manifest_dir: Option<PathBuf>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            manifest_dir: None,
        }
    }

    /// Check the index manifest in `dir` before every query.
    pub fn with_manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifest_dir = Some(dir.into());
        self
    }

    /// Retrieve at most `k` passages for `query`, best first.
    ///
    /// Passages carry citation ids `1..=N` in rank order. The ids only mean
    /// something within the returned result.
    #[instrument(skip(self), fields(backend = self.index.backend_name()))]
    pub async fn retrieve(&self, query: &str, k: usize) -> AppResult<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(AppError::Validation("Query cannot be empty".to_string()));
        }
        if k > MAX_TOP_K {
            return Err(AppError::Validation(format!(
                "Cannot retrieve {} passages; the limit is {}",
                k, MAX_TOP_K
            )));
        }

        if let Some(dir) = &self.manifest_dir {
            if let Some(manifest) = IndexManifest::load(dir)? {
                manifest.ensure_compatible(&EmbeddingSpace::of(self.embedder.as_ref()))?;
            }
        }

        if k == 0 {
            return Ok(RetrievalResult {
                query: query.to_string(),
                passages: Vec::new(),
            });
        }

        let vector = self.embedder.embed(query).await?;
        let candidates = self.index.query(&vector, k.saturating_mul(OVERFETCH_FACTOR)).await?;
        let passages = number_passages(dedup(candidates), k);

        if let Some(top) = passages.first() {
            tracing::info!(
                "Retrieved {} passages (top score: {:.3}, {} page {})",
                passages.len(),
                top.score,
                top.source_filename,
                top.source_page
            );
        } else {
            tracing::info!("No passages found; the index is empty");
        }

        Ok(RetrievalResult {
            query: query.to_string(),
            passages,
        })
    }
}

/// Drop records repeating an earlier record's text and provenance.
fn dedup(candidates: Vec<ScoredRecord>) -> Vec<ScoredRecord> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| {
            seen.insert((
                c.record.text.clone(),
                c.record.source_filename.clone(),
                c.record.source_page,
            ))
        })
        .collect()
}

/// Keep the best `k` and assign rank-local citation ids.
fn number_passages(mut ranked: Vec<ScoredRecord>, k: usize) -> Vec<RetrievedPassage> {
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, scored)| RetrievedPassage {
            citation_id: i as u32 + 1,
            score: scored.score,
            text: scored.record.text,
            source_filename: scored.record.source_filename,
            source_page: scored.record.source_page,
        })
        .collect()
}
