//! Embedding clients shared by the indexing and query pipelines.

use anyhow::Result;

mod voyage;

pub use voyage::VoyageEmbedder;

/// Role of the texts being embedded.
///
/// Query-role and document-role embeddings are not symmetric in the underlying
/// model; mixing them degrades recall, so every call states its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Corpus text being indexed.
    Document,
    /// User query text being searched.
    Query,
}

impl InputKind {
    /// Wire value expected by the embedding service.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Query => "query",
        }
    }
}

/// Trait implemented by concrete embedding backends.
pub trait EmbeddingClient {
    /// Embeds one batch of texts, preserving input order 1:1.
    ///
    /// Implementations must not mutate their inputs; identical texts and kind
    /// always produce a request of identical shape.
    fn embed(&self, texts: &[&str], kind: InputKind) -> Result<Vec<Vec<f32>>>;

    /// Maximum number of texts accepted per [`EmbeddingClient::embed`] call.
    fn batch_size(&self) -> usize;
}
