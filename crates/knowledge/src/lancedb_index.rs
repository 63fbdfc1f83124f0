//! LanceDB-backed vector index.
//!
//! Records live in a single `chunks` table under the index directory. Every
//! `add` is one Lance commit, so concurrent readers see a batch either
//! entirely or not at all.

use crate::types::{IndexRecord, ScoredRecord};
use crate::vector_index::{cosine_similarity, rank, VectorIndex};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray, UInt32Array,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use pdfchat_core::{AppError, AppResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Table holding every indexed chunk.
pub const TABLE_NAME: &str = "chunks";

/// Embedding column name.
const VECTOR_COLUMN: &str = "vector";

/// LanceDB-backed vector index.
pub struct LanceDbIndex {
    path: PathBuf,
    conn: Connection,
    table: RwLock<Table>,
    dimensions: usize,
}

impl std::fmt::Debug for LanceDbIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceDbIndex")
            .field("path", &self.path)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl LanceDbIndex {
    /// Create or open the index at `db_path`.
    ///
    /// # Arguments
    /// * `db_path` - Directory for the LanceDB database
    /// * `dimensions` - Dimension of embedding vectors (e.g., 768)
    pub async fn open(db_path: &Path, dimensions: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            AppError::Index(format!(
                "Failed to create index directory {:?}: {}",
                db_path, e
            ))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.iter().any(|name| name == TABLE_NAME) {
            conn.open_table(TABLE_NAME)
                .execute()
                .await
                .map_err(|e| AppError::Index(format!("Failed to open table: {}", e)))?
        } else {
            Self::create_table(&conn, dimensions).await?
        };

        tracing::debug!("Initialized LanceDB index at {:?}", db_path);

        Ok(Self {
            path: db_path.to_path_buf(),
            conn,
            table: RwLock::new(table),
            dimensions,
        })
    }

    /// Directory holding the database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn create_table(conn: &Connection, dimensions: usize) -> AppResult<Table> {
        let schema = Self::create_schema(dimensions);
        let empty_batch = RecordBatch::new_empty(schema.clone());

        conn.create_table(
            TABLE_NAME,
            RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
        )
        .execute()
        .await
        .map_err(|e| AppError::Index(format!("Failed to create table: {}", e)))
    }

    /// Arrow schema for the chunks table.
    fn create_schema(dimensions: usize) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("source_filename", DataType::Utf8, false),
            Field::new("source_page", DataType::UInt32, false),
            Field::new("position", DataType::UInt32, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("indexed_at", DataType::Int64, false), // Unix micros
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions as i32,
                ),
                false,
            ),
        ]))
    }

    /// Current table handle. The lock is never held across an await.
    fn table(&self) -> AppResult<Table> {
        self.table
            .read()
            .map(|t| t.clone())
            .map_err(|_| AppError::Index("LanceDB table lock poisoned".to_string()))
    }

    /// Vector width of the table as stored on disk.
    async fn stored_dimensions(table: &Table) -> AppResult<Option<usize>> {
        let schema = table
            .schema()
            .await
            .map_err(|e| AppError::Index(format!("Failed to read table schema: {}", e)))?;

        Ok(schema
            .field_with_name(VECTOR_COLUMN)
            .ok()
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => Some(*size as usize),
                _ => None,
            }))
    }

    /// Convert records to one Arrow RecordBatch.
    fn records_to_batch(&self, records: &[IndexRecord]) -> AppResult<RecordBatch> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimensions) {
            return Err(AppError::Index(format!(
                "Embedding dimension mismatch for record {}: expected {}, got {}",
                bad.id,
                self.dimensions,
                bad.vector.len()
            )));
        }

        let schema = Self::create_schema(self.dimensions);

        let ids = StringArray::from(records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>());
        let texts =
            StringArray::from(records.iter().map(|r| r.text.as_str()).collect::<Vec<_>>());
        let sources = StringArray::from(
            records
                .iter()
                .map(|r| r.source_filename.as_str())
                .collect::<Vec<_>>(),
        );
        let pages = UInt32Array::from(records.iter().map(|r| r.source_page).collect::<Vec<_>>());
        let positions = UInt32Array::from(records.iter().map(|r| r.position).collect::<Vec<_>>());
        let hashes = StringArray::from(
            records
                .iter()
                .map(|r| r.content_hash.as_str())
                .collect::<Vec<_>>(),
        );
        let indexed_at = Int64Array::from(
            records
                .iter()
                .map(|r| r.indexed_at.timestamp_micros())
                .collect::<Vec<_>>(),
        );

        let flat: Vec<f32> = records.iter().flat_map(|r| r.vector.iter().copied()).collect();
        let vectors = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimensions as i32,
            Arc::new(Float32Array::from(flat)),
            None,
        )
        .map_err(|e| AppError::Index(format!("Failed to build vector column: {}", e)))?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(ids),
                Arc::new(texts),
                Arc::new(sources),
                Arc::new(pages),
                Arc::new(positions),
                Arc::new(hashes),
                Arc::new(indexed_at),
                Arc::new(vectors),
            ],
        )
        .map_err(|e| AppError::Index(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Convert every row of a result batch back into records.
    fn batch_to_records(batch: &RecordBatch) -> AppResult<Vec<IndexRecord>> {
        let ids = string_column(batch, "id")?;
        let texts = string_column(batch, "text")?;
        let sources = string_column(batch, "source_filename")?;
        let hashes = string_column(batch, "content_hash")?;
        let pages = typed_column::<UInt32Array>(batch, "source_page")?;
        let positions = typed_column::<UInt32Array>(batch, "position")?;
        let indexed_at = typed_column::<Int64Array>(batch, "indexed_at")?;
        let vectors = typed_column::<FixedSizeListArray>(batch, VECTOR_COLUMN)?;

        (0..batch.num_rows())
            .map(|row| {
                let values = vectors.value(row);
                let values = values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| AppError::Index("Invalid vector values".to_string()))?;

                Ok(IndexRecord {
                    id: ids.value(row).to_string(),
                    vector: values.values().to_vec(),
                    text: texts.value(row).to_string(),
                    source_filename: sources.value(row).to_string(),
                    source_page: pages.value(row),
                    position: positions.value(row),
                    content_hash: hashes.value(row).to_string(),
                    indexed_at: DateTime::<Utc>::from_timestamp_micros(indexed_at.value(row))
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Replace the table with an empty one of the configured width.
    async fn recreate_table(&self) -> AppResult<()> {
        let table_dir = self.path.join(format!("{}.lance", TABLE_NAME));
        if table_dir.exists() {
            tokio::fs::remove_dir_all(&table_dir).await.map_err(|e| {
                AppError::Index(format!("Failed to remove table {:?}: {}", table_dir, e))
            })?;
        }

        let table = Self::create_table(&self.conn, self.dimensions).await?;
        *self
            .table
            .write()
            .map_err(|_| AppError::Index("LanceDB table lock poisoned".to_string()))? = table;

        tracing::info!(
            dimensions = self.dimensions,
            "Recreated LanceDB table with new vector width"
        );
        Ok(())
    }
}

fn typed_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| AppError::Index(format!("Invalid {} column", name)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    typed_column::<StringArray>(batch, name)
}

#[async_trait]
impl VectorIndex for LanceDbIndex {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn upsert(&self, records: &[IndexRecord]) -> AppResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let batch = self.records_to_batch(records)?;
        let schema = batch.schema();

        self.table()?
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to add records: {}", e)))?;

        tracing::debug!("Inserted {} records into LanceDB", records.len());
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> AppResult<Vec<ScoredRecord>> {
        if k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        if vector.len() != self.dimensions {
            return Err(AppError::Index(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }

        let batches: Vec<RecordBatch> = self
            .table()?
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| AppError::Index(format!("Failed to create query: {}", e)))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| AppError::Index(format!("Failed to execute search: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| AppError::Index(format!("Failed to collect results: {}", e)))?;

        let mut scored = Vec::new();
        for batch in &batches {
            for record in Self::batch_to_records(batch)? {
                scored.push(ScoredRecord {
                    score: cosine_similarity(vector, &record.vector),
                    record,
                });
            }
        }

        tracing::debug!(
            "Retrieved {} records (requested top-{})",
            scored.len(),
            k
        );

        Ok(rank(scored, k))
    }

    async fn clear(&self) -> AppResult<()> {
        let table = self.table()?;

        if Self::stored_dimensions(&table).await? != Some(self.dimensions) {
            return self.recreate_table().await;
        }

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))?;

        if count > 0 {
            table
                .delete("id IS NOT NULL")
                .await
                .map_err(|e| AppError::Index(format!("Failed to clear index: {}", e)))?;
        }

        tracing::info!("Cleared LanceDB index ({} records removed)", count);
        Ok(())
    }

    async fn count(&self) -> AppResult<usize> {
        self.table()?
            .count_rows(None)
            .await
            .map_err(|e| AppError::Index(format!("Failed to count rows: {}", e)))
    }
}
