//! End-to-end pipeline tests: chunk a real directory, index into an on-disk
//! LanceDB store, and retrieve with a deterministic stub embedder.

use std::fs;
use std::time::Duration;

use anyhow::Result;
use lexrag::{
    ChunkStore, Chunker, EmbeddingClient, IndexMode, IndexStore, Indexer, InputKind,
    PipelineConfig, Retriever,
};
use pretty_assertions::assert_eq;

/// Maps each text to a fixed-width fingerprint vector so nearest-neighbor
/// results are predictable without a network call.
struct StubEmbedder;

impl StubEmbedder {
    fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; 8];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 8] += f32::from(byte) / 255.0;
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl EmbeddingClient for StubEmbedder {
    fn embed(&self, texts: &[&str], _kind: InputKind) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| Self::vector_for(text)).collect())
    }

    fn batch_size(&self) -> usize {
        8
    }
}

fn test_config(table: &str) -> PipelineConfig {
    PipelineConfig {
        batch_size: 2,
        inter_batch_delay: Duration::ZERO,
        table_name: table.to_string(),
        ..PipelineConfig::default()
    }
}

#[test]
fn index_then_query_round_trip() {
    let docs = tempfile::tempdir().unwrap();
    fs::write(
        docs.path().join("contracts.md"),
        "Overview of contract law.\n\n## Formation\nOffer and acceptance.\n\n## Remedies\nDamages and specific performance.\n",
    )
    .unwrap();
    fs::write(
        docs.path().join("torts.md"),
        "## Negligence\nDuty, breach, causation, harm.\n",
    )
    .unwrap();

    let index_dir = tempfile::tempdir().unwrap();
    let config = test_config("dev_docs");
    let chunker = Chunker::new();
    let chunks: Vec<_> = chunker.chunks(docs.path()).collect();
    assert_eq!(chunks.len(), 4);

    let embedder = StubEmbedder;
    let mut store = IndexStore::open(index_dir.path(), &config.table_name).unwrap();
    let indexer = Indexer::new(&config, IndexMode::Append);
    let report = indexer.run(chunks.clone(), &embedder, &mut store).unwrap();
    assert_eq!(report.indexed, 4);
    assert_eq!(report.skipped, 0);

    // The exact text of an indexed chunk embeds to the same vector, so it must
    // come back as the nearest neighbor.
    let retriever = Retriever::new(&embedder, &store, None, config.k_broad);
    let results = retriever
        .search("## Negligence\nDuty, breach, causation, harm.", 3)
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].filename, "torts.md");
    assert!(results
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
}

#[test]
fn rerun_against_unchanged_directory_is_idempotent() {
    let docs = tempfile::tempdir().unwrap();
    fs::write(
        docs.path().join("doc.md"),
        "## One\nfirst section\n\n## Two\nsecond section\n",
    )
    .unwrap();

    let index_dir = tempfile::tempdir().unwrap();
    let config = test_config("dev_docs");
    let chunker = Chunker::new();
    let embedder = StubEmbedder;
    let mut store = IndexStore::open(index_dir.path(), &config.table_name).unwrap();
    let indexer = Indexer::new(&config, IndexMode::Append);

    let first = indexer
        .run(chunker.chunks(docs.path()).collect(), &embedder, &mut store)
        .unwrap();
    assert_eq!(first.indexed, 2);

    let second = indexer
        .run(chunker.chunks(docs.path()).collect(), &embedder, &mut store)
        .unwrap();
    assert_eq!(second.indexed, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(store.existing_fingerprints().unwrap().len(), 2);
}

#[test]
fn overwrite_rebuild_replaces_prior_records() {
    let docs = tempfile::tempdir().unwrap();
    fs::write(docs.path().join("old.md"), "## Old\nstale content\n").unwrap();

    let index_dir = tempfile::tempdir().unwrap();
    let config = test_config("dev_docs");
    let chunker = Chunker::new();
    let embedder = StubEmbedder;
    let mut store = IndexStore::open(index_dir.path(), &config.table_name).unwrap();

    Indexer::new(&config, IndexMode::Append)
        .run(chunker.chunks(docs.path()).collect(), &embedder, &mut store)
        .unwrap();

    fs::remove_file(docs.path().join("old.md")).unwrap();
    fs::write(docs.path().join("new.md"), "## New\nfresh content\n").unwrap();

    let report = Indexer::new(&config, IndexMode::Overwrite)
        .run(chunker.chunks(docs.path()).collect(), &embedder, &mut store)
        .unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(store.existing_fingerprints().unwrap().len(), 1);
}
