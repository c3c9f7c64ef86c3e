#![warn(missing_docs)]
//! Core library entry points for the lexrag retrieval pipeline.

pub mod answer;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod indexer;
pub mod reranker;
pub mod retriever;
pub mod retry;
pub mod store;

pub use answer::AnthropicClient;
pub use chunker::{Chunk, Chunker};
pub use config::PipelineConfig;
pub use embedder::{EmbeddingClient, InputKind, VoyageEmbedder};
pub use indexer::{IndexMode, IndexReport, Indexer};
pub use reranker::{RankedHit, Reranker, VoyageReranker};
pub use retriever::{Retriever, SearchResult};
pub use retry::Backoff;
pub use store::{ChunkStore, IndexStore, ScoredChunk};
