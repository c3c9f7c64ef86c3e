//! Two-stage retrieve-then-rerank query pipeline.

use anyhow::{Context, Result};

use crate::embedder::{EmbeddingClient, InputKind};
use crate::reranker::Reranker;
use crate::store::ChunkStore;

/// One ranked answer-grounding snippet returned per query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Display label of the source chunk.
    pub filename: String,
    /// Chunk body text.
    pub text: String,
    /// Relevance score: the rerank-stage score when reranking runs, otherwise
    /// the first-stage similarity score.
    pub score: f32,
}

/// Embeds the query, performs a broad similarity search, then narrows the
/// candidates with a second relevance-scoring pass.
///
/// When no reranker is configured the second stage is skipped and the broad
/// candidates are simply truncated; this is a documented degraded mode.
pub struct Retriever<'a> {
    embedder: &'a dyn EmbeddingClient,
    store: &'a dyn ChunkStore,
    reranker: Option<&'a dyn Reranker>,
    k_broad: usize,
}

impl<'a> Retriever<'a> {
    /// Builds a retriever over the given collaborators.
    pub fn new(
        embedder: &'a dyn EmbeddingClient,
        store: &'a dyn ChunkStore,
        reranker: Option<&'a dyn Reranker>,
        k_broad: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            reranker,
            k_broad: k_broad.max(1),
        }
    }

    /// Returns up to `k_final` results, strictly descending by relevance.
    pub fn search(&self, query: &str, k_final: usize) -> Result<Vec<SearchResult>> {
        let mut vectors = self
            .embedder
            .embed(&[query], InputKind::Query)
            .context("failed to embed query")?;
        anyhow::ensure!(
            vectors.len() == 1,
            "expected one query embedding, got {}",
            vectors.len()
        );
        let query_vector = vectors.remove(0);

        let candidates = self
            .store
            .search(&query_vector, self.k_broad)
            .context("first-stage similarity search failed")?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let Some(reranker) = self.reranker else {
            return Ok(candidates
                .into_iter()
                .take(k_final)
                .map(|hit| SearchResult {
                    filename: hit.filename,
                    text: hit.text,
                    score: hit.score,
                })
                .collect());
        };

        let documents: Vec<&str> = candidates.iter().map(|hit| hit.text.as_str()).collect();
        let ranked = reranker
            .rerank(query, &documents, k_final)
            .context("rerank stage failed")?;

        let mut results = Vec::with_capacity(ranked.len().min(k_final));
        for hit in ranked.into_iter().take(k_final) {
            let candidate = candidates.get(hit.index).with_context(|| {
                format!(
                    "reranker referenced candidate {} of {}",
                    hit.index,
                    candidates.len()
                )
            })?;
            results.push(SearchResult {
                filename: candidate.filename.clone(),
                text: candidate.text.clone(),
                score: hit.relevance_score,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use crate::reranker::RankedHit;
    use crate::store::ScoredChunk;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    struct QueryEmbedder;

    impl EmbeddingClient for QueryEmbedder {
        fn embed(&self, texts: &[&str], kind: InputKind) -> Result<Vec<Vec<f32>>> {
            assert_eq!(kind, InputKind::Query);
            Ok(texts.iter().map(|_| vec![0.5, 0.5]).collect())
        }

        fn batch_size(&self) -> usize {
            1
        }
    }

    struct CannedStore {
        candidates: Vec<ScoredChunk>,
    }

    impl CannedStore {
        fn with_texts(texts: &[&str]) -> Self {
            let candidates = texts
                .iter()
                .enumerate()
                .map(|(i, text)| ScoredChunk {
                    filename: format!("doc{}.md", i),
                    text: text.to_string(),
                    path: "/tmp/doc".to_string(),
                    score: 1.0 - i as f32 * 0.1,
                })
                .collect();
            Self { candidates }
        }

        fn empty() -> Self {
            Self {
                candidates: Vec::new(),
            }
        }
    }

    impl ChunkStore for CannedStore {
        fn existing_fingerprints(&self) -> Result<HashSet<u32>> {
            Ok(HashSet::new())
        }

        fn append(&mut self, _chunks: &[Chunk]) -> Result<()> {
            unimplemented!("not used by retrieval tests")
        }

        fn reset(&mut self) -> Result<()> {
            unimplemented!("not used by retrieval tests")
        }

        fn search(&self, _vector: &[f32], limit: usize) -> Result<Vec<ScoredChunk>> {
            Ok(self.candidates.iter().take(limit).cloned().collect())
        }
    }

    struct CannedReranker {
        hits: Vec<RankedHit>,
    }

    impl Reranker for CannedReranker {
        fn rerank(&self, _query: &str, _documents: &[&str], _top_k: usize) -> Result<Vec<RankedHit>> {
            Ok(self.hits.clone())
        }
    }

    struct UnreachableReranker;

    impl Reranker for UnreachableReranker {
        fn rerank(&self, _query: &str, _documents: &[&str], _top_k: usize) -> Result<Vec<RankedHit>> {
            panic!("reranker must not run when stage one returns nothing");
        }
    }

    #[test]
    fn reranker_indices_map_back_to_original_candidates() {
        let embedder = QueryEmbedder;
        let store = CannedStore::with_texts(&["A", "B", "C", "D", "E"]);
        let reranker = CannedReranker {
            hits: vec![
                RankedHit {
                    index: 3,
                    relevance_score: 0.9,
                },
                RankedHit {
                    index: 0,
                    relevance_score: 0.5,
                },
            ],
        };
        let retriever = Retriever::new(&embedder, &store, Some(&reranker), 20);

        let results = retriever.search("question", 5).unwrap();
        let summary: Vec<(&str, f32)> = results
            .iter()
            .map(|r| (r.text.as_str(), r.score))
            .collect();
        assert_eq!(summary, vec![("D", 0.9), ("A", 0.5)]);
    }

    #[test]
    fn empty_first_stage_short_circuits_before_reranking() {
        let embedder = QueryEmbedder;
        let store = CannedStore::empty();
        let reranker = UnreachableReranker;
        let retriever = Retriever::new(&embedder, &store, Some(&reranker), 20);

        let results = retriever.search("question", 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn missing_reranker_truncates_with_similarity_scores() {
        let embedder = QueryEmbedder;
        let store = CannedStore::with_texts(&["A", "B", "C", "D", "E"]);
        let retriever = Retriever::new(&embedder, &store, None, 20);

        let results = retriever.search("question", 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "A");
        assert_eq!(results[1].text, "B");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn out_of_range_rerank_index_is_an_error() {
        let embedder = QueryEmbedder;
        let store = CannedStore::with_texts(&["A", "B"]);
        let reranker = CannedReranker {
            hits: vec![RankedHit {
                index: 7,
                relevance_score: 0.4,
            }],
        };
        let retriever = Retriever::new(&embedder, &store, Some(&reranker), 20);

        assert!(retriever.search("question", 5).is_err());
    }

    #[test]
    fn result_count_never_exceeds_k_final() {
        let embedder = QueryEmbedder;
        let store = CannedStore::with_texts(&["A", "B", "C", "D", "E"]);
        let retriever = Retriever::new(&embedder, &store, None, 3);

        let results = retriever.search("question", 10).unwrap();
        assert_eq!(results.len(), 3);
    }
}
