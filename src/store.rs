//! LanceDB-backed index collection adapter.
//!
//! The collection is a named table inside a directory-backed LanceDB database.
//! It outlives the process and is appended to incrementally across runs. The
//! design assumes single-writer, single-process access; concurrent runs against
//! the same collection are unsupported.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use futures::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, Table};
use tokio::runtime::Runtime;

use crate::chunker::Chunk;

/// A stored chunk returned from similarity search, with its display score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// Display label of the source chunk.
    pub filename: String,
    /// Chunk body text.
    pub text: String,
    /// Source file path.
    pub path: String,
    /// Similarity-style display score derived from the search distance
    /// (`1 / (1 + distance)`, higher is closer).
    pub score: f32,
}

/// Persistence seam between the pipeline and the vector collection.
pub trait ChunkStore {
    /// Fingerprints of every chunk already persisted (empty when the
    /// collection does not exist yet).
    fn existing_fingerprints(&self) -> Result<HashSet<u32>>;

    /// Appends embedded chunks, creating the collection on the first batch.
    ///
    /// Every chunk must carry a vector; the call is the unit of persistence
    /// atomicity.
    fn append(&mut self, chunks: &[Chunk]) -> Result<()>;

    /// Drops the collection if present (full-rebuild mode).
    fn reset(&mut self) -> Result<()>;

    /// Nearest-neighbor search returning up to `limit` chunks, closest first.
    fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;
}

/// Directory-backed LanceDB store exposed through a blocking facade.
pub struct IndexStore {
    runtime: Runtime,
    connection: Connection,
    table_name: String,
}

impl IndexStore {
    /// Opens (creating if needed) the database directory at `dir`.
    pub fn open(dir: &Path, table_name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create index directory {}", dir.display()))?;
        let runtime = Runtime::new().context("failed to start store runtime")?;
        let uri = dir.to_string_lossy().to_string();
        let connection = runtime
            .block_on(lancedb::connect(&uri).execute())
            .with_context(|| format!("failed to open LanceDB at {}", uri))?;
        Ok(Self {
            runtime,
            connection,
            table_name: table_name.to_string(),
        })
    }

    /// True when the index table already exists in the database.
    pub fn table_exists(&self) -> Result<bool> {
        let names = self
            .runtime
            .block_on(self.connection.table_names().execute())
            .context("failed to list LanceDB tables")?;
        Ok(names.iter().any(|name| name == &self.table_name))
    }

    fn open_table(&self) -> Result<Table> {
        self.runtime
            .block_on(self.connection.open_table(&self.table_name).execute())
            .with_context(|| format!("failed to open table '{}'", self.table_name))
    }

    fn chunk_schema(dimensions: i32) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("filename", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("path", DataType::Utf8, false),
            Field::new("fingerprint", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimensions,
                ),
                true,
            ),
        ]))
    }

    fn to_record_batch(chunks: &[Chunk]) -> Result<(RecordBatch, Arc<Schema>)> {
        let dimensions = chunks
            .iter()
            .find_map(|chunk| chunk.vector.as_ref().map(Vec::len))
            .context("cannot persist a batch with no embedded chunks")?;
        for chunk in chunks {
            let vector = chunk
                .vector
                .as_ref()
                .with_context(|| format!("chunk '{}' has no embedding vector", chunk.filename))?;
            anyhow::ensure!(
                vector.len() == dimensions,
                "chunk '{}' vector width {} differs from batch width {}",
                chunk.filename,
                vector.len(),
                dimensions
            );
        }

        let schema = Self::chunk_schema(dimensions as i32);
        let filenames =
            StringArray::from(chunks.iter().map(|c| c.filename.clone()).collect::<Vec<_>>());
        let texts = StringArray::from(chunks.iter().map(|c| c.text.clone()).collect::<Vec<_>>());
        let paths = StringArray::from(chunks.iter().map(|c| c.path.clone()).collect::<Vec<_>>());
        let fingerprints =
            UInt32Array::from(chunks.iter().map(|c| c.fingerprint).collect::<Vec<_>>());
        let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            chunks.iter().map(|chunk| {
                chunk
                    .vector
                    .as_ref()
                    .map(|vector| vector.iter().copied().map(Some).collect::<Vec<_>>())
            }),
            dimensions as i32,
        );
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(filenames),
                Arc::new(texts),
                Arc::new(paths),
                Arc::new(fingerprints),
                Arc::new(vectors),
            ],
        )
        .context("failed to assemble record batch")?;
        Ok((batch, schema))
    }
}

impl ChunkStore for IndexStore {
    fn existing_fingerprints(&self) -> Result<HashSet<u32>> {
        if !self.table_exists()? {
            return Ok(HashSet::new());
        }
        let table = self.open_table()?;
        self.runtime.block_on(async {
            let mut stream = table
                .query()
                .select(Select::Columns(vec!["fingerprint".to_string()]))
                .execute()
                .await
                .context("failed to scan existing fingerprints")?;
            let mut fingerprints = HashSet::new();
            while let Some(batch) = stream.next().await {
                let batch = batch.context("failed to read fingerprint batch")?;
                let column = batch
                    .column_by_name("fingerprint")
                    .context("index table is missing the fingerprint column")?;
                let values = column
                    .as_any()
                    .downcast_ref::<UInt32Array>()
                    .context("fingerprint column has an unexpected type")?;
                for i in 0..values.len() {
                    fingerprints.insert(values.value(i));
                }
            }
            Ok(fingerprints)
        })
    }

    fn append(&mut self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let (batch, schema) = Self::to_record_batch(chunks)?;
        if self.table_exists()? {
            let table = self.open_table()?;
            let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.runtime
                .block_on(table.add(Box::new(reader)).execute())
                .with_context(|| format!("failed to append to table '{}'", self.table_name))?;
        } else {
            let reader = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);
            self.runtime
                .block_on(self.connection.create_table(&self.table_name, reader).execute())
                .with_context(|| format!("failed to create table '{}'", self.table_name))?;
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        if self.table_exists()? {
            self.runtime
                .block_on(self.connection.drop_table(&self.table_name, &[]))
                .with_context(|| format!("failed to drop table '{}'", self.table_name))?;
        }
        Ok(())
    }

    fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
        anyhow::ensure!(
            self.table_exists()?,
            "index table '{}' not found; run build-index before querying",
            self.table_name
        );
        let table = self.open_table()?;
        self.runtime.block_on(async {
            let mut stream = table
                .query()
                .nearest_to(vector.to_vec())
                .context("failed to build vector query")?
                .limit(limit)
                .execute()
                .await
                .context("vector search failed")?;
            let mut results = Vec::new();
            while let Some(batch) = stream.next().await {
                let batch = batch.context("failed to read search batch")?;
                let filenames = string_column(&batch, "filename")?;
                let texts = string_column(&batch, "text")?;
                let paths = string_column(&batch, "path")?;
                let distances = batch
                    .column_by_name("_distance")
                    .and_then(|col| col.as_any().downcast_ref::<Float32Array>().cloned());
                for i in 0..batch.num_rows() {
                    let distance = distances.as_ref().map(|d| d.value(i)).unwrap_or(0.0);
                    results.push(ScoredChunk {
                        filename: filenames.value(i).to_string(),
                        text: texts.value(i).to_string(),
                        path: paths.value(i).to_string(),
                        score: 1.0 / (1.0 + distance),
                    });
                }
            }
            Ok(results)
        })
    }
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>().cloned())
        .with_context(|| format!("search result is missing the '{}' column", name))
}
