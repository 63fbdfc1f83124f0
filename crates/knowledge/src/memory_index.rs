//! In-memory vector index with brute-force cosine search.

use crate::types::{IndexRecord, ScoredRecord};
use crate::vector_index::{cosine_similarity, rank, VectorIndex};
use async_trait::async_trait;
use pdfchat_core::{AppError, AppResult};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Vector index held entirely in memory.
///
/// Nothing is persisted. Used by tests and by throwaway runs that do not
/// need an on-disk index.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    records: RwLock<Vec<IndexRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Vec<IndexRecord>>> {
        self.records
            .read()
            .map_err(|_| AppError::Index("In-memory index lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Vec<IndexRecord>>> {
        self.records
            .write()
            .map_err(|_| AppError::Index("In-memory index lock poisoned".to_string()))
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, records: &[IndexRecord]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.write()?.extend_from_slice(records);
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<ScoredRecord>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let scored = self
            .read()?
            .iter()
            .map(|record| ScoredRecord {
                score: cosine_similarity(vector, &record.vector),
                record: record.clone(),
            })
            .collect();

        Ok(rank(scored, k))
    }

    async fn clear(&self) -> AppResult<()> {
        self.write()?.clear();
        Ok(())
    }

    async fn count(&self) -> AppResult<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn record(id: &str, vector: Vec<f32>, page: u32) -> IndexRecord {
        IndexRecord {
            id: id.to_string(),
            vector,
            text: format!("text of {}", id),
            source_filename: "doc.pdf".to_string(),
            source_page: page,
            position: 0,
            content_hash: crate::chunk::calculate_hash(id),
            indexed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let index = InMemoryIndex::new();
        assert!(index.query(&[1.0, 0.0], 3).await.unwrap().is_empty());
        assert_eq!(index.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exact_vector_ranks_first() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record("a", vec![1.0, 0.0, 0.0], 1),
                record("b", vec![0.0, 1.0, 0.0], 2),
                record("c", vec![0.7, 0.7, 0.0], 3),
            ])
            .await
            .unwrap();

        let results = index.query(&[0.0, 1.0, 0.0], 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].record.id, "b");
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_query_respects_k() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[record("a", vec![1.0, 0.0], 1), record("b", vec![0.0, 1.0], 1)])
            .await
            .unwrap();

        assert_eq!(index.query(&[1.0, 0.0], 1).await.unwrap().len(), 1);
        assert_eq!(index.query(&[1.0, 0.0], 5).await.unwrap().len(), 2);
        assert!(index.query(&[1.0, 0.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upserts_accumulate_until_cleared() {
        let index = InMemoryIndex::new();
        let batch = [record("a", vec![1.0, 0.0], 1)];

        index.upsert(&batch).await.unwrap();
        index.upsert(&batch).await.unwrap();
        index.upsert(&[]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);

        index.clear().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(index.query(&[1.0, 0.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_readers_see_whole_batches_during_writes() {
        const BATCH: usize = 10;
        const BATCHES: usize = 50;

        let index = std::sync::Arc::new(InMemoryIndex::new());

        let writer = {
            let index = index.clone();
            tokio::spawn(async move {
                for b in 0..BATCHES {
                    let batch: Vec<_> = (0..BATCH)
                        .map(|i| record(&format!("{}-{}", b, i), vec![1.0, b as f32, i as f32], 1))
                        .collect();
                    index.upsert(&batch).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let index = index.clone();
            tokio::spawn(async move {
                loop {
                    let results = index.query(&[1.0, 0.0, 0.0], usize::MAX).await.unwrap();
                    assert_eq!(results.len() % BATCH, 0);
                    for scored in &results {
                        assert_eq!(scored.record.vector.len(), 3);
                        assert_eq!(scored.record.text, format!("text of {}", scored.record.id));
                    }
                    if results.len() == BATCH * BATCHES {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let (written, read) = tokio::join!(writer, reader);
        written.unwrap();
        read.unwrap();
        assert_eq!(index.count().await.unwrap(), BATCH * BATCHES);
    }
}
