//! Second-stage relevance scoring against the Voyage rerank API.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

const DEFAULT_ENDPOINT: &str = "https://api.voyageai.com/v1/rerank";

/// One reranked candidate: the index into the submitted document list plus the
/// service-reported relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedHit {
    /// Position of the document in the submitted candidate list.
    pub index: usize,
    /// Relevance score assigned by the rerank model (higher is better).
    pub relevance_score: f32,
}

/// Trait implemented by concrete rerank backends.
pub trait Reranker {
    /// Scores `documents` against `query` and returns the best `top_k` hits in
    /// descending relevance order.
    fn rerank(&self, query: &str, documents: &[&str], top_k: usize) -> Result<Vec<RankedHit>>;
}

/// Blocking rerank client that talks to the Voyage AI API.
#[derive(Clone)]
pub struct VoyageReranker {
    client: Client,
    endpoint: String,
    model: String,
}

impl VoyageReranker {
    /// Builds a new Voyage rerank client.
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Voyage API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing rerank model name");
        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid Voyage API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Voyage rerank HTTP client")?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model,
        })
    }

    /// Overrides the API endpoint (proxy or compatible deployments).
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }
}

impl Reranker for VoyageReranker {
    fn rerank(&self, query: &str, documents: &[&str], top_k: usize) -> Result<Vec<RankedHit>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_k,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .context("failed to call Voyage rerank API")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("Voyage rerank request failed ({}): {}", status, body);
        }
        let parsed: RerankResponse = resp.json().context("failed to parse rerank response")?;
        Ok(parsed
            .data
            .into_iter()
            .map(|entry| RankedHit {
                index: entry.index,
                relevance_score: entry.relevance_score,
            })
            .collect())
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [&'a str],
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    data: Vec<RerankData>,
}

#[derive(Debug, Deserialize)]
struct RerankData {
    index: usize,
    relevance_score: f32,
}
