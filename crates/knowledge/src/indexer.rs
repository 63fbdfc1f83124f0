//! Index builder.
//!
//! Walks the source directory and runs every document through extraction,
//! chunking, embedding and persistence. A document that fails is skipped and
//! reported; its siblings still run.

use crate::chunk::Chunker;
use crate::embeddings::{EmbeddingProvider, EmbeddingSpace};
use crate::manifest::IndexManifest;
use crate::parser::{discover_documents, file_name, DocumentExtractor};
use crate::progress::{IndexerPhase, ProgressReporter};
use crate::types::{BuildReport, DocumentFailure, FailureStage, IndexRecord};
use crate::vector_index::VectorIndex;
use chrono::Utc;
use pdfchat_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Default number of chunks sent per embedding request.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Result of indexing one document.
enum DocumentOutcome {
    Indexed(usize),
    Skipped(DocumentFailure),
}

/// Builds or extends the vector index from a directory of documents.
pub struct Indexer {
    extractor: Arc<dyn DocumentExtractor>,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    manifest_dir: Option<PathBuf>,
    batch_size: usize,
    progress: ProgressReporter,
}

impl Indexer {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            extractor,
            chunker,
            embedder,
            index,
            manifest_dir: None,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: ProgressReporter::noop(),
        }
    }

    /// Persist and check the index manifest in `dir`.
    pub fn with_manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifest_dir = Some(dir.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Index every document in `source_dir`.
    ///
    /// With `overwrite`, the index is cleared first and the run fully replaces
    /// it. Without it, records are appended; re-adding a document duplicates
    /// its records.
    ///
    /// # Errors
    /// - `AppError::Index` if the index or manifest cannot be read or written,
    ///   or an additive build targets an index of another embedding model
    /// - `AppError::Embedding` if embedding failed and no document succeeded
    pub async fn build(&self, source_dir: &Path, overwrite: bool) -> AppResult<BuildReport> {
        let start = Instant::now();
        let space = EmbeddingSpace::of(self.embedder.as_ref());

        tracing::info!(
            source = ?source_dir,
            overwrite,
            embedding = %space,
            "Starting index build"
        );

        let mut manifest = if overwrite {
            self.progress.enter(IndexerPhase::Clearing, None, 0, None);
            self.index.clear().await?;
            let manifest = IndexManifest::new(space);
            self.save_manifest(&manifest)?;
            manifest
        } else {
            match self.load_manifest()? {
                Some(existing) => {
                    existing.ensure_compatible(&space)?;
                    existing
                }
                None => IndexManifest::new(space),
            }
        };

        self.progress.enter(IndexerPhase::Scanning, None, 0, None);
        let documents = discover_documents(source_dir, self.extractor.as_ref())?;

        let mut report = BuildReport {
            overwrite,
            ..Default::default()
        };

        if documents.is_empty() {
            let signal = AppError::NoDocumentsFound(source_dir.display().to_string());
            tracing::warn!("{}", signal);
        }

        let total = documents.len();
        for (i, path) in documents.iter().enumerate() {
            match self.index_document(path, i, total).await? {
                DocumentOutcome::Indexed(chunks) => {
                    report.documents_processed += 1;
                    report.chunks_created += chunks;
                }
                DocumentOutcome::Skipped(failure) => {
                    tracing::warn!(
                        file = %failure.filename,
                        stage = ?failure.stage,
                        "Skipping document: {}",
                        failure.message
                    );
                    report.failures.push(failure);
                }
            }
        }

        manifest.record_build(report.documents_processed, report.chunks_created);
        self.save_manifest(&manifest)?;
        self.progress
            .enter(IndexerPhase::Idle, None, report.documents_processed, Some(total));

        if report.documents_processed == 0 {
            if let Some(failure) = report
                .failures
                .iter()
                .find(|f| f.stage == FailureStage::Embedding)
            {
                return Err(AppError::Embedding(format!(
                    "No document could be embedded ({} failed). First failure on {}: {}",
                    report.failures.len(),
                    failure.filename,
                    failure.message
                )));
            }
        }

        report.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Index build completed: {} documents, {} chunks, {} skipped in {:.2}s",
            report.documents_processed,
            report.chunks_created,
            report.failures.len(),
            report.duration_secs
        );

        Ok(report)
    }

    /// Extract, chunk, embed and persist one document.
    ///
    /// Extraction and embedding failures are returned as a skipped outcome.
    /// Storage failures abort the whole build.
    async fn index_document(
        &self,
        path: &Path,
        position: usize,
        total: usize,
    ) -> AppResult<DocumentOutcome> {
        let filename = match file_name(path) {
            Ok(name) => name,
            Err(e) => {
                return Ok(DocumentOutcome::Skipped(DocumentFailure {
                    filename: path.display().to_string(),
                    stage: FailureStage::Extraction,
                    message: e.to_string(),
                }))
            }
        };
        let skip = |stage: FailureStage, error: AppError| -> AppResult<DocumentOutcome> {
            Ok(DocumentOutcome::Skipped(DocumentFailure {
                filename: filename.clone(),
                stage,
                message: error.to_string(),
            }))
        };

        self.progress
            .enter(IndexerPhase::Extracting, Some(&filename), position, Some(total));
        let document = match self.extractor.extract(path).await {
            Ok(document) => document,
            Err(e) => return skip(FailureStage::Extraction, e),
        };

        self.progress
            .enter(IndexerPhase::Chunking, Some(&filename), position, Some(total));
        let (text, pages) = document.concatenate();
        let chunks = self.chunker.split(&text, &filename, &pages);

        if chunks.is_empty() {
            tracing::info!(file = %filename, "Document has no extractable text");
            return Ok(DocumentOutcome::Indexed(0));
        }

        self.progress
            .enter(IndexerPhase::Embedding, Some(&filename), position, Some(total));
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match self.embedder.embed_batch(&texts).await {
                Ok(embedded) if embedded.len() == texts.len() => vectors.extend(embedded),
                Ok(embedded) => {
                    let error = AppError::Embedding(format!(
                        "Expected {} embeddings, got {}",
                        texts.len(),
                        embedded.len()
                    ));
                    return skip(FailureStage::Embedding, error);
                }
                Err(e) => return skip(FailureStage::Embedding, e),
            }
        }

        self.progress
            .enter(IndexerPhase::Persisting, Some(&filename), position, Some(total));
        let indexed_at = Utc::now();
        let records: Vec<IndexRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexRecord {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                text: chunk.text,
                source_filename: chunk.source_filename,
                source_page: chunk.source_page,
                position: chunk.position,
                content_hash: chunk.hash,
                indexed_at,
            })
            .collect();

        self.index.upsert(&records).await?;

        tracing::debug!(file = %filename, chunks = records.len(), "Indexed document");
        Ok(DocumentOutcome::Indexed(records.len()))
    }

    fn load_manifest(&self) -> AppResult<Option<IndexManifest>> {
        match &self.manifest_dir {
            Some(dir) => IndexManifest::load(dir),
            None => Ok(None),
        }
    }

    fn save_manifest(&self, manifest: &IndexManifest) -> AppResult<()> {
        match &self.manifest_dir {
            Some(dir) => manifest.save(dir),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkConfig;
    use crate::embeddings::MockProvider;
    use crate::memory_index::InMemoryIndex;
    use crate::progress::ProgressEvent;
    use crate::test_support::{write_doc, TextPdfExtractor};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn indexer(embedder: MockProvider, index: Arc<InMemoryIndex>) -> Indexer {
        Indexer::new(
            Arc::new(TextPdfExtractor),
            Chunker::new(ChunkConfig::new(200, 40).unwrap()),
            Arc::new(embedder),
            index,
        )
    }

    fn long_page(topic: &str) -> String {
        (0..20)
            .map(|i| format!("Sentence {} about the {} of the house. ", i, topic))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_source_directory_is_zero_count_success() {
        let temp = TempDir::new().unwrap();
        let index = Arc::new(InMemoryIndex::new());

        let report = indexer(MockProvider::new(64), index.clone())
            .build(temp.path(), false)
            .await
            .unwrap();

        assert_eq!(report.documents_processed, 0);
        assert_eq!(report.chunks_created, 0);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_directory_is_zero_count_success() {
        let temp = TempDir::new().unwrap();
        let report = indexer(MockProvider::new(64), Arc::new(InMemoryIndex::new()))
            .build(&temp.path().join("nope"), true)
            .await
            .unwrap();
        assert_eq!(report.documents_processed, 0);
    }

    #[tokio::test]
    async fn test_build_indexes_every_chunk() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "roof.pdf", &[&long_page("roof"), &long_page("attic")]);
        write_doc(temp.path(), "kitchen.pdf", &["Kitchen cabinets are oak."]);
        write_doc(temp.path(), "notes.txt", &["ignored"]);
        let index = Arc::new(InMemoryIndex::new());

        let report = indexer(MockProvider::new(64), index.clone())
            .with_batch_size(3)
            .build(temp.path(), true)
            .await
            .unwrap();

        assert_eq!(report.documents_processed, 2);
        assert!(report.chunks_created > 2);
        assert_eq!(index.count().await.unwrap(), report.chunks_created);
    }

    #[tokio::test]
    async fn test_overwrite_build_is_idempotent() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "roof.pdf", &[&long_page("roof")]);
        let index = Arc::new(InMemoryIndex::new());
        let indexer = indexer(MockProvider::new(64), index.clone());

        let first = indexer.build(temp.path(), true).await.unwrap();
        let second = indexer.build(temp.path(), true).await.unwrap();

        assert_eq!(first.documents_processed, second.documents_processed);
        assert_eq!(first.chunks_created, second.chunks_created);
        assert_eq!(index.count().await.unwrap(), second.chunks_created);
    }

    #[tokio::test]
    async fn test_additive_build_duplicates_records() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "roof.pdf", &["The roof was replaced in 2020."]);
        let index = Arc::new(InMemoryIndex::new());
        let indexer = indexer(MockProvider::new(64), index.clone());

        indexer.build(temp.path(), false).await.unwrap();
        indexer.build(temp.path(), false).await.unwrap();

        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_only_that_document() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "bad.pdf", &["This page is POISON for the embedder."]);
        write_doc(temp.path(), "good.pdf", &["The roof was replaced in 2020."]);
        let index = Arc::new(InMemoryIndex::new());

        let report = indexer(MockProvider::new(64).failing_on("POISON"), index.clone())
            .build(temp.path(), true)
            .await
            .unwrap();

        assert_eq!(report.documents_processed, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].filename, "bad.pdf");
        assert_eq!(report.failures[0].stage, FailureStage::Embedding);
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_everywhere_is_error() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "a.pdf", &["POISON one"]);
        write_doc(temp.path(), "b.pdf", &["POISON two"]);

        let result = indexer(
            MockProvider::new(64).failing_on("POISON"),
            Arc::new(InMemoryIndex::new()),
        )
        .build(temp.path(), true)
        .await;

        assert!(matches!(result, Err(AppError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_extraction_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("binary.pdf"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();
        write_doc(temp.path(), "good.pdf", &["The roof was replaced in 2020."]);

        let report = indexer(MockProvider::new(64), Arc::new(InMemoryIndex::new()))
            .build(temp.path(), false)
            .await
            .unwrap();

        assert_eq!(report.documents_processed, 1);
        assert_eq!(report.failures[0].filename, "binary.pdf");
        assert_eq!(report.failures[0].stage, FailureStage::Extraction);
    }

    #[tokio::test]
    async fn test_blank_document_counts_as_processed() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "scan.pdf", &["   ", "\n"]);

        let report = indexer(MockProvider::new(64), Arc::new(InMemoryIndex::new()))
            .build(temp.path(), false)
            .await
            .unwrap();

        assert_eq!(report.documents_processed, 1);
        assert_eq!(report.chunks_created, 0);
    }

    #[tokio::test]
    async fn test_manifest_tracks_embedding_space() {
        let source = TempDir::new().unwrap();
        let index_dir = TempDir::new().unwrap();
        write_doc(source.path(), "roof.pdf", &["The roof was replaced in 2020."]);

        let index = Arc::new(InMemoryIndex::new());
        indexer(MockProvider::new(64), index.clone())
            .with_manifest_dir(index_dir.path())
            .build(source.path(), true)
            .await
            .unwrap();

        let manifest = IndexManifest::load(index_dir.path()).unwrap().unwrap();
        assert_eq!(manifest.embedding.provider, "mock");
        assert_eq!(manifest.embedding.dimensions, 64);
        assert_eq!(manifest.documents, 1);
        assert_eq!(manifest.chunks, 1);

        // Additive build with another vector width is refused
        let result = indexer(MockProvider::new(32), index.clone())
            .with_manifest_dir(index_dir.path())
            .build(source.path(), false)
            .await;
        match result {
            Err(AppError::Index(msg)) => assert!(msg.contains("rebuild with overwrite")),
            other => panic!("Expected index error, got {:?}", other.map(|r| r.chunks_created)),
        }

        // Overwrite switches the index to the new space
        indexer(MockProvider::new(32), index)
            .with_manifest_dir(index_dir.path())
            .build(source.path(), true)
            .await
            .unwrap();
        let manifest = IndexManifest::load(index_dir.path()).unwrap().unwrap();
        assert_eq!(manifest.embedding.dimensions, 32);
        assert_eq!(manifest.chunks, 1);
    }

    #[tokio::test]
    async fn test_progress_walks_phases_in_order() {
        let temp = TempDir::new().unwrap();
        write_doc(temp.path(), "roof.pdf", &["The roof was replaced in 2020."]);

        let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::new(Arc::new(move |e| sink.lock().unwrap().push(e)));

        indexer(MockProvider::new(64), Arc::new(InMemoryIndex::new()))
            .with_progress(reporter)
            .build(temp.path(), true)
            .await
            .unwrap();

        let phases: Vec<IndexerPhase> = events.lock().unwrap().iter().map(|e| e.phase).collect();
        assert_eq!(
            phases,
            vec![
                IndexerPhase::Clearing,
                IndexerPhase::Scanning,
                IndexerPhase::Extracting,
                IndexerPhase::Chunking,
                IndexerPhase::Embedding,
                IndexerPhase::Persisting,
                IndexerPhase::Idle,
            ]
        );
    }
}
