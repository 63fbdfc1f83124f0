//! Vector index abstraction.
//!
//! Defines a trait for backend-agnostic storage of embedded chunks and
//! nearest-neighbor retrieval.

use crate::types::{IndexRecord, ScoredRecord};
use async_trait::async_trait;
use pdfchat_core::AppResult;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Appending records (no dedup key, repeated upserts accumulate)
/// - Searching for the top-k most similar vectors
/// - Clearing every persisted record
///
/// Handles are shared between concurrent requests, so every method takes
/// `&self`. A reader racing a write sees each record either fully written or
/// not at all.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs and stats.
    fn backend_name(&self) -> &str;

    /// Append records. Empty input is a no-op.
    async fn upsert(&self, records: &[IndexRecord]) -> AppResult<()>;

    /// Return at most `k` records ordered by descending cosine similarity.
    ///
    /// An empty index yields an empty result, not an error.
    async fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<ScoredRecord>>;

    /// Remove all records.
    async fn clear(&self) -> AppResult<()>;

    /// Number of stored records.
    async fn count(&self) -> AppResult<usize>;
}

/// Calculate cosine similarity between two vectors.
///
/// Mismatched lengths and zero vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort scored records best first and keep the top `k`.
///
/// The sort is stable, so equal scores keep their incoming order.
pub(crate) fn rank(mut scored: Vec<ScoredRecord>, k: usize) -> Vec<ScoredRecord> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[3.0, 4.0], &[6.0, 8.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
