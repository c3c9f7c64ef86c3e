//! Anthropic-backed answer generation grounded in retrieved chunks.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::retriever::SearchResult;

const MESSAGES_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

const SYSTEM_PROMPT: &str = "You are an expert legal research assistant. \
Answer using ONLY the provided context. Cite specific provisions from the \
context whenever possible. If the provided documents do not contain the \
answer, say so.";

/// Blocking chat-completion client for the Anthropic Messages API.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    max_tokens: usize,
    client: Client,
}

impl AnthropicClient {
    /// Builds a new answer client.
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Anthropic API key");
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Anthropic HTTP client")?;
        Ok(Self {
            api_key,
            model,
            max_tokens: 2048,
            client,
        })
    }

    /// Generates an answer to `query` grounded in the retrieved `context`.
    pub fn answer(&self, query: &str, context: &[SearchResult]) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.trim()).context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let user_message = build_user_message(query, context);
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: SYSTEM_PROMPT,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &user_message,
            }],
        };
        let resp = self
            .client
            .post(MESSAGES_ENDPOINT)
            .headers(headers)
            .json(&body)
            .send()
            .context("failed to call Anthropic messages API")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            bail!("Anthropic returned {}: {}", status, text);
        }
        let parsed: AnthropicResponse = resp.json().context("failed to parse Anthropic response")?;
        let answer = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if answer.is_empty() {
            bail!("Anthropic response missing text content");
        }
        Ok(answer)
    }
}

/// Combines the retrieved snippets and the user's question into one message.
///
/// Each snippet keeps its filename and relevance score so the model (and the
/// reader of its citations) can see where a statement came from.
fn build_user_message(query: &str, context: &[SearchResult]) -> String {
    let mut context_text = String::new();
    for item in context {
        context_text.push_str(&format!(
            "---\nSOURCE: {} (Relevance: {:.2})\nCONTENT:\n{}\n",
            item.filename, item.score, item.text
        ));
    }
    format!(
        "### RETRIEVED CONTEXT:\n{}\n\n### QUESTION:\n{}",
        context_text, query
    )
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
