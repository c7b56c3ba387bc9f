//! Canned embedding and generation services shared by the integration
//! tests. No test talks to a live model.

#![allow(dead_code)]

use async_trait::async_trait;
use fieldmap::embedding::EmbeddingService;
use fieldmap::generation::GenerationService;
use fieldmap::{MapError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Returns the vector of the first needle contained in the text, or the
/// fallback. Tracks calls and peak concurrency.
pub struct TableEmbedder {
    table: Vec<(String, Vec<f32>)>,
    fallback: Vec<f32>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl TableEmbedder {
    pub fn new(table: Vec<(&str, Vec<f32>)>, fallback: Vec<f32>) -> Self {
        Self {
            table: table
                .into_iter()
                .map(|(needle, v)| (needle.to_string(), v))
                .collect(),
            fallback,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for TableEmbedder {
    fn model_name(&self) -> &str {
        "table"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if text.contains("FAIL") {
            return Err(MapError::service("embed", Some(500), "Internal Server Error"));
        }
        let vector = self
            .table
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.fallback.clone());
        Ok(vector)
    }
}

type Script = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Answers every prompt through a closure and records the prompts.
pub struct ScriptedGenerator {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(script: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `response`.
    pub fn canned(response: &str) -> Self {
        let response = response.to_string();
        Self::new(move |_| Ok(response.clone()))
    }

    /// Always fails with a 503.
    pub fn failing() -> Self {
        Self::new(|_| Err(MapError::service("generate", Some(503), "Service Unavailable")))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.script)(prompt)
    }
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-5,
        "expected {expected}, got {actual}"
    );
}
