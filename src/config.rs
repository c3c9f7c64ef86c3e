//! Centralized pipeline configuration shared by indexing and query binaries.

use std::time::Duration;

/// Tunable knobs that bound pipeline behavior.
///
/// Components receive this (or the relevant fields) at construction instead of
/// consulting module-level constants, so a run's behavior is fully determined by
/// one value.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Embedding model identifier sent to the Voyage API.
    pub embedding_model: String,
    /// Rerank model identifier sent to the Voyage API.
    pub rerank_model: String,
    /// Maximum number of chunk texts per embedding request.
    pub batch_size: usize,
    /// Deliberate client-side pause between successful embedding batches.
    pub inter_batch_delay: Duration,
    /// Retries allowed per batch before a transient failure becomes fatal.
    pub max_retries: usize,
    /// Candidate count for the broad first-stage similarity search.
    pub k_broad: usize,
    /// Result count after the precision rerank stage.
    pub k_final: usize,
    /// Name of the LanceDB table holding embedded chunks.
    pub table_name: String,
    /// Timeout applied to every outbound HTTP request.
    pub http_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            embedding_model: "voyage-law-2".to_string(),
            rerank_model: "rerank-2".to_string(),
            batch_size: 50,
            inter_batch_delay: Duration::from_secs(1),
            max_retries: 5,
            k_broad: 20,
            k_final: 5,
            table_name: "dev_docs".to_string(),
            http_timeout: Duration::from_secs(60),
        }
    }
}
