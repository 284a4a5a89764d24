//! Embedding and chat-generation capabilities.
//!
//! Both capabilities are behind traits so the pipeline can be tested with
//! stub providers. The production implementation is [`OllamaClient`],
//! which talks to a local Ollama daemon over HTTP.
//!
//! # Retry Strategy
//!
//! Transient failures (HTTP 429, 5xx, network errors) are retried with
//! exponential backoff (1s, 2s, 4s, ...). Other client errors fail
//! immediately. Retries apply to provider transport only; the query
//! orchestrator never retries a completed-but-failed generation.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ModelsConfig;

/// Opaque embedding capability: given text, return a vector.
///
/// Ingestion and retrieval must share one implementation — mismatched
/// embedding spaces silently degrade retrieval quality.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Opaque chat capability: given a system instruction and a user message,
/// return the model's answer text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        temperature: f32,
        system: &str,
        user: &str,
    ) -> Result<String>;
}

/// HTTP client for a local Ollama daemon.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    embed_model: String,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(config: &ModelsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embed_model: config.embed_model.clone(),
            max_retries: config.max_retries,
        })
    }

    async fn post_with_retry<B: Serialize>(&self, url: &str, body: &B) -> Result<reqwest::Response> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match self.http.post(url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow::anyhow!("Ollama API error {}: {}", status, text));
                        continue;
                    }
                    // Client error — don't retry.
                    bail!("Ollama API error {}: {}", status, text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("request failed after retries")))
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbeddingsRequest {
            model: &self.embed_model,
            prompt: text,
        };

        let response = self.post_with_retry(&url, &body).await?;
        let parsed: EmbeddingsResponse = response.json().await?;

        if parsed.embedding.is_empty() {
            bail!("Ollama returned an empty embedding");
        }
        Ok(parsed.embedding)
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl ChatModel for OllamaClient {
    async fn generate(
        &self,
        model: &str,
        temperature: f32,
        system: &str,
        user: &str,
    ) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
            options: ChatOptions { temperature },
        };

        let response = self.post_with_retry(&url, &body).await?;
        let parsed: ChatResponse = response.json().await?;
        Ok(parsed.message.content)
    }
}
