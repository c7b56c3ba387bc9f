//! Text-generation adapter.
//!
//! [`GenerationService`] is the contract with an external language model:
//! a prompt in, free text out. Its output is untrusted and always goes
//! through the parser's recovery ladder before use.

use async_trait::async_trait;
use fieldmap_core::{MapError, Result};
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::http;

#[async_trait]
pub trait GenerationService: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Generation service backed by an Ollama-compatible `/api/generate`.
pub struct OllamaGenerationService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OllamaGenerationService {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http::build_client("generate", config.timeout_secs)?,
            endpoint: format!("{}/api/generate", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationService for OllamaGenerationService {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(MapError::invalid_input("generate", "prompt is empty"));
        }
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };
        let response: GenerateResponse = http::post_json(
            &self.client,
            "generate",
            &self.endpoint,
            &request,
            self.max_retries,
        )
        .await?;
        Ok(response.response)
    }
}
