//! Voyage AI embedding client implementation.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::retry::{is_transient, Backoff};

use super::{EmbeddingClient, InputKind};

const DEFAULT_ENDPOINT: &str = "https://api.voyageai.com/v1/embeddings";

/// Blocking embeddings client that talks to the Voyage AI API.
#[derive(Clone)]
pub struct VoyageEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_retries: usize,
    batch_size: usize,
}

impl VoyageEmbedder {
    /// Builds a new Voyage embeddings client.
    pub fn new(
        api_key: String,
        model: String,
        timeout: Duration,
        max_retries: usize,
        batch_size: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Voyage API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing Voyage model name");
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
            .context("failed to build Voyage HTTP client")?;
        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model,
            max_retries,
            batch_size: batch_size.max(1),
        })
    }

    /// Overrides the API endpoint (proxy or compatible deployments).
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    fn attempt_once(&self, texts: &[&str], kind: InputKind) -> Result<Vec<Vec<f32>>> {
        let request = VoyageEmbeddingRequest {
            model: &self.model,
            input: texts,
            input_type: kind.as_str(),
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .context("failed to call Voyage embeddings API")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("Voyage embeddings request failed ({}): {}", status, body);
        }
        let mut parsed: VoyageEmbeddingResponse = resp
            .json()
            .context("failed to parse Voyage embedding response")?;
        parsed.data.sort_by_key(|entry| entry.index);
        anyhow::ensure!(
            parsed.data.len() == texts.len(),
            "Voyage returned {} embeddings for {} inputs",
            parsed.data.len(),
            texts.len()
        );
        Ok(parsed
            .data
            .into_iter()
            .map(|entry| entry.embedding)
            .collect())
    }
}

impl EmbeddingClient for VoyageEmbedder {
    fn embed(&self, texts: &[&str], kind: InputKind) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        anyhow::ensure!(
            texts.len() <= self.batch_size,
            "batch of {} exceeds configured max {}",
            texts.len(),
            self.batch_size
        );

        let mut backoff = Backoff::new(self.max_retries);
        loop {
            match self.attempt_once(texts, kind) {
                Ok(vectors) => return Ok(vectors),
                Err(err) => {
                    let message = format!("{:#}", err);
                    if !is_transient(&message) && !is_transport_failure(&err) {
                        return Err(err.context("non-transient Voyage embedding failure"));
                    }
                    match backoff.next_delay() {
                        Some(delay) => {
                            eprintln!(
                                "   transient Voyage error ({}); retrying in {}s (attempt {}/{})",
                                message,
                                delay.as_secs(),
                                backoff.retries_used(),
                                backoff.max_retries()
                            );
                            thread::sleep(delay);
                        }
                        None => {
                            return Err(err.context(format!(
                                "Voyage embedding failed after {} retries",
                                backoff.max_retries()
                            )))
                        }
                    }
                }
            }
        }
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Connection drops and socket timeouts are retryable even when the error text
/// carries none of the known transient markers.
fn is_transport_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|e| e.is_timeout() || e.is_connect())
            .unwrap_or(false)
    })
}

#[derive(Serialize)]
struct VoyageEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    input_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct VoyageEmbeddingResponse {
    data: Vec<VoyageEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct VoyageEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
