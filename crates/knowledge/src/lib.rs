//! Retrieval-augmented question answering over a directory of PDFs.
//!
//! The pipeline has two halves:
//! - **Indexing**: extract page text, split it into overlapping chunks,
//!   embed each chunk and persist it in a vector index ([`Indexer`])
//! - **Answering**: embed a question, fetch the closest chunks
//!   ([`Retriever`]) and stream a model answer whose citations are checked
//!   against those chunks ([`GroundedGenerator`])
//!
//! [`KnowledgeBase`] wires both halves together from an [`AppConfig`].

pub mod chunk;
pub mod embeddings;
pub mod indexer;
pub mod lancedb_index;
pub mod manifest;
pub mod memory_index;
pub mod parser;
pub mod progress;
pub mod rag;
pub mod retriever;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use chunk::{ChunkConfig, Chunker};
pub use embeddings::{create_provider, EmbeddingProvider, EmbeddingSpace};
pub use indexer::Indexer;
pub use lancedb_index::LanceDbIndex;
pub use manifest::IndexManifest;
pub use memory_index::InMemoryIndex;
pub use parser::{DocumentExtractor, PdfExtractor};
pub use progress::{IndexerPhase, ProgressEvent, ProgressReporter};
pub use rag::{Citation, GenerationEvent, GenerationStream, GroundedGenerator};
pub use retriever::{Retriever, DEFAULT_TOP_K, MAX_TOP_K};
pub use types::{BuildReport, DocumentFailure, IndexStats, RetrievalResult, RetrievedPassage};
pub use vector_index::VectorIndex;

use pdfchat_core::{AppConfig, AppError, AppResult};
use pdfchat_llm::{create_client, LlmClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The indexing and answering pipeline for one workspace.
pub struct KnowledgeBase {
    indexer: Indexer,
    retriever: Retriever,
    generator: GroundedGenerator,
    index: Arc<dyn VectorIndex>,
    source_dir: PathBuf,
    index_dir: PathBuf,
    top_k: usize,
}

impl KnowledgeBase {
    /// Build the pipeline described by `config`, backed by LanceDB.
    ///
    /// # Errors
    /// - `AppError::Config` for unknown providers or missing credentials
    /// - `AppError::Validation` for unusable chunk sizes
    /// - `AppError::Index` if the index directory cannot be opened
    pub async fn open(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let api_key = config.api_key.as_deref();
        let embedder = create_provider(&config.embedding, api_key)?;
        let llm = create_client(&config.llm, api_key)?;
        let index = LanceDbIndex::open(&config.index_path(), config.embedding.dimensions).await?;

        tracing::info!(
            index = %config.index_path().display(),
            embedding = %EmbeddingSpace::of(embedder.as_ref()),
            llm = llm.provider_name(),
            "Opened knowledge base"
        );

        Self::from_parts(
            config,
            Arc::new(PdfExtractor::new()),
            embedder,
            Arc::new(index),
            llm,
        )
    }

    /// Assemble the pipeline from explicit components.
    pub fn from_parts(
        config: &AppConfig,
        extractor: Arc<dyn DocumentExtractor>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LlmClient>,
    ) -> AppResult<Self> {
        if config.top_k > MAX_TOP_K {
            return Err(AppError::Validation(format!(
                "topK ({}) cannot exceed {}",
                config.top_k, MAX_TOP_K
            )));
        }
        let chunker = Chunker::new(ChunkConfig::new(config.chunk_size, config.chunk_overlap)?);
        let index_dir = config.index_path();

        let indexer = Indexer::new(extractor, chunker, embedder.clone(), index.clone())
            .with_manifest_dir(&index_dir)
            .with_batch_size(config.embedding.batch_size);
        let retriever = Retriever::new(embedder, index.clone()).with_manifest_dir(&index_dir);
        let generator =
            GroundedGenerator::new(llm, &config.llm).with_prompts_dir(config.prompts_dir());

        Ok(Self {
            indexer,
            retriever,
            generator,
            index,
            source_dir: config.source_path(),
            index_dir,
            top_k: config.top_k,
        })
    }

    /// Report indexing progress to `progress`.
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.indexer = self.indexer.with_progress(progress);
        self
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Passages retrieved when the caller does not ask for a count.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Index the configured source directory.
    pub async fn build(&self, overwrite: bool) -> AppResult<BuildReport> {
        self.indexer.build(&self.source_dir, overwrite).await
    }

    /// Index another directory into the same index.
    pub async fn build_from(&self, source_dir: &Path, overwrite: bool) -> AppResult<BuildReport> {
        self.indexer.build(source_dir, overwrite).await
    }

    /// Retrieve passages for `query`, `k` defaulting to the configured top-k.
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> AppResult<RetrievalResult> {
        self.retriever
            .retrieve(query, k.unwrap_or(self.top_k))
            .await
    }

    /// Stream a grounded answer over an existing retrieval.
    pub async fn generate(
        &self,
        query: &str,
        retrieval: &RetrievalResult,
    ) -> AppResult<GenerationStream> {
        self.generator.generate(query, retrieval).await
    }

    /// Retrieve and answer in one step.
    pub async fn ask(&self, query: &str, k: Option<usize>) -> AppResult<GenerationStream> {
        let retrieval = self.retrieve(query, k).await?;
        self.generate(query, &retrieval).await
    }

    /// Record count and build metadata of the index.
    pub async fn stats(&self) -> AppResult<IndexStats> {
        Ok(IndexStats {
            records: self.index.count().await?,
            manifest: IndexManifest::load(&self.index_dir)?,
        })
    }
}
