//! Embedding adapter.
//!
//! [`EmbeddingService`] is the request/response contract with an external
//! embedding model: one text in, one vector out. [`OllamaEmbeddingService`]
//! implements it over HTTP (`POST {url}/api/embeddings` with
//! `{model, prompt}` → `{embedding}`); tests substitute canned services.
//!
//! [`embed_text`] and [`embed_batch`] add input validation and bounded
//! fan-out on top of any service.

use async_trait::async_trait;
use fieldmap_core::{MapError, Result};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::http;

/// Trait for embedding services.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Embed one non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding service backed by an Ollama-compatible HTTP endpoint.
pub struct OllamaEmbeddingService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_retries: u32,
}

impl OllamaEmbeddingService {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client("embed", config.timeout_secs)?,
            endpoint: format!("{}/api/embeddings", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingService for OllamaEmbeddingService {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };
        let response: EmbeddingResponse = http::post_json(
            &self.client,
            "embed",
            &self.endpoint,
            &request,
            self.max_retries,
        )
        .await?;

        if response.embedding.is_empty() {
            return Err(MapError::service(
                "embed",
                None,
                "response contained an empty embedding",
            ));
        }
        Ok(response.embedding)
    }
}

/// Embed a single text.
///
/// # Errors
///
/// - [`MapError::InvalidInput`] if `text` is empty or only whitespace.
/// - [`MapError::Service`] propagated from the service.
pub async fn embed_text(service: &dyn EmbeddingService, text: &str) -> Result<Vec<f32>> {
    if text.trim().is_empty() {
        return Err(MapError::invalid_input("embed_text", "text is empty"));
    }
    service.embed(text).await
}

/// Embed many texts, preserving input order.
///
/// Texts are processed in chunks of `batch_size`: every embedding in a
/// chunk is requested concurrently, and the chunk is awaited before the
/// next one starts, so at most `batch_size` requests are in flight. Any
/// failing item fails the whole batch.
///
/// # Errors
///
/// - [`MapError::InvalidInput`] on an empty `texts`, a zero `batch_size`,
///   or an empty item.
/// - [`MapError::Service`] from the first failing request.
pub async fn embed_batch(
    service: &dyn EmbeddingService,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Err(MapError::invalid_input("embed_batch", "no texts to embed"));
    }
    if batch_size == 0 {
        return Err(MapError::invalid_input("embed_batch", "batch_size must be > 0"));
    }

    let mut vectors = Vec::with_capacity(texts.len());
    for (i, chunk) in texts.chunks(batch_size).enumerate() {
        debug!(chunk = i, size = chunk.len(), "embedding chunk");
        let embedded = try_join_all(chunk.iter().map(|t| embed_text(service, t))).await?;
        vectors.extend(embedded);
    }
    Ok(vectors)
}
