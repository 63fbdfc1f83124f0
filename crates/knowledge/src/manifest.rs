//! Index manifest.
//!
//! `manifest.json` in the index directory records which embedding space the
//! stored vectors belong to, so an index is never silently queried or
//! extended with vectors from another model.

use crate::embeddings::EmbeddingSpace;
use chrono::{DateTime, Utc};
use pdfchat_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file name inside the index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Build metadata persisted next to the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Embedding space of every stored vector
    pub embedding: EmbeddingSpace,

    /// When the index was last built from scratch
    pub created_at: DateTime<Utc>,

    /// When records were last added
    pub updated_at: DateTime<Utc>,

    /// Documents indexed since `created_at`
    pub documents: usize,

    /// Chunks indexed since `created_at`
    pub chunks: usize,
}

impl IndexManifest {
    /// A manifest for an empty index in `embedding`.
    pub fn new(embedding: EmbeddingSpace) -> Self {
        let now = Utc::now();
        Self {
            embedding,
            created_at: now,
            updated_at: now,
            documents: 0,
            chunks: 0,
        }
    }

    /// Path of the manifest for an index directory.
    pub fn path(index_dir: &Path) -> PathBuf {
        index_dir.join(MANIFEST_FILE)
    }

    /// Load the manifest, if one has been written.
    pub fn load(index_dir: &Path) -> AppResult<Option<Self>> {
        let path = Self::path(index_dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            AppError::Index(format!("Failed to read manifest {:?}: {}", path, e))
        })?;
        let manifest = serde_json::from_str(&content).map_err(|e| {
            AppError::Index(format!("Corrupt manifest {:?}: {}", path, e))
        })?;

        Ok(Some(manifest))
    }

    /// Write the manifest atomically.
    pub fn save(&self, index_dir: &Path) -> AppResult<()> {
        fs::create_dir_all(index_dir)?;

        let path = Self::path(index_dir);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)?;

        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!("Saved index manifest to {:?}", path);
        Ok(())
    }

    /// Record a finished batch of documents.
    pub fn record_build(&mut self, documents: usize, chunks: usize) {
        self.documents += documents;
        self.chunks += chunks;
        self.updated_at = Utc::now();
    }

    /// Fail unless the stored vectors came from `active`.
    pub fn ensure_compatible(&self, active: &EmbeddingSpace) -> AppResult<()> {
        match self.embedding.validate_consistency(active) {
            Err(AppError::Index(reason)) => Err(AppError::Index(format!(
                "{}. The index was built with {}; rebuild with overwrite to switch to {}",
                reason, self.embedding, active
            ))),
            other => other,
        }
    }
}
