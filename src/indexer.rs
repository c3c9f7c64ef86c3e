//! Incremental indexing: dedup, batched embedding, batch-at-a-time persistence.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::chunker::Chunk;
use crate::config::PipelineConfig;
use crate::embedder::{EmbeddingClient, InputKind};
use crate::store::ChunkStore;

/// How a run treats an existing index collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    /// Keep existing records and add only unseen chunks (the default).
    Append,
    /// Drop the collection and rebuild it from scratch (required after an
    /// embedding-model change, since vector widths are incompatible).
    Overwrite,
}

/// Outcome of one indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    /// Chunks embedded and persisted during this run.
    pub indexed: usize,
    /// Chunks whose fingerprint was already present in the collection.
    pub skipped: usize,
}

/// Orchestrates chunk dedup, batched embedding, and per-batch persistence.
///
/// Each batch is appended to the store immediately after its vectors arrive, so
/// a mid-run failure loses at most the failing batch; everything before it
/// stays durable and a re-run skips it.
pub struct Indexer {
    batch_size: usize,
    inter_batch_delay: Duration,
    mode: IndexMode,
}

impl Indexer {
    /// Builds an indexer from the pipeline configuration.
    pub fn new(config: &PipelineConfig, mode: IndexMode) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            inter_batch_delay: config.inter_batch_delay,
            mode,
        }
    }

    /// Runs one indexing pass over `chunks`.
    pub fn run(
        &self,
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingClient,
        store: &mut dyn ChunkStore,
    ) -> Result<IndexReport> {
        if self.mode == IndexMode::Overwrite {
            store.reset().context("failed to clear existing index")?;
        }
        let existing = store
            .existing_fingerprints()
            .context("failed to read existing index state")?;

        let total = chunks.len();
        let mut to_process: Vec<Chunk> = chunks
            .into_iter()
            .filter(|chunk| !existing.contains(&chunk.fingerprint))
            .collect();
        let skipped = total - to_process.len();
        if skipped > 0 {
            eprintln!("   Skipping {} already indexed chunks.", skipped);
        }
        if to_process.is_empty() {
            eprintln!("   All chunks already indexed; nothing to do.");
            return Ok(IndexReport { indexed: 0, skipped });
        }

        let batch_size = self.batch_size.min(embedder.batch_size()).max(1);
        let total_batches = to_process.len().div_ceil(batch_size);
        let mut indexed = 0usize;

        for (batch_index, batch) in to_process.chunks_mut(batch_size).enumerate() {
            let batch_number = batch_index + 1;
            eprintln!(
                "   Batch {}/{} ({} chunks)...",
                batch_number,
                total_batches,
                batch.len()
            );

            let texts: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
            let vectors = embedder
                .embed(&texts, InputKind::Document)
                .with_context(|| format!("embedding failed on batch {}", batch_number))?;
            anyhow::ensure!(
                vectors.len() == batch.len(),
                "batch {} returned {} vectors for {} chunks",
                batch_number,
                vectors.len(),
                batch.len()
            );
            for (chunk, vector) in batch.iter_mut().zip(vectors) {
                chunk.vector = Some(vector);
            }

            store
                .append(batch)
                .with_context(|| format!("failed to persist batch {}", batch_number))?;
            indexed += batch.len();
            eprintln!("   Batch {}/{} saved.", batch_number, total_batches);

            if batch_number < total_batches && !self.inter_batch_delay.is_zero() {
                thread::sleep(self.inter_batch_delay);
            }
        }

        Ok(IndexReport { indexed, skipped })
    }
}
