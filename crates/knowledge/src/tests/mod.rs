//! Crate-level tests exercising several modules together.

mod chunk_coverage;
mod ingest;

use crate::embeddings::providers::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use medrag_core::config::CollectionConfig;
use medrag_core::{AppConfig, AppError, AppResult};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) const DIMENSIONS: usize = 64;

pub(crate) const ONCOLOGY_TEXT: &str = "Breast cancer staging uses the TNM system.\n\n\
Tamoxifen is used for hormone receptor positive breast cancer.\n\n\
Radiotherapy usually follows breast conserving surgery.";

pub(crate) const NEUROLOGY_TEXT: &str = "Migraine attacks are treated with triptans.\n\n\
Levodopa remains the most effective treatment for Parkinson disease.\n\n\
Glioblastoma is treated with surgery, radiotherapy and temozolomide.";

/// Trigram provider that counts every batch it embeds.
#[derive(Debug)]
pub(crate) struct CountingProvider {
    inner: TrigramProvider,
    batches: AtomicUsize,
}

impl CountingProvider {
    pub fn new() -> Self {
        Self {
            inner: TrigramProvider::new(DIMENSIONS),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingProvider {
    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

/// Provider that embeds a few batches and then fails.
#[derive(Debug)]
pub(crate) struct FailingProvider {
    inner: TrigramProvider,
    succeed: usize,
    calls: AtomicUsize,
}

impl FailingProvider {
    pub fn after(succeed: usize) -> Self {
        Self {
            inner: TrigramProvider::new(DIMENSIONS),
            succeed,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    fn provider_name(&self) -> &str {
        "failing"
    }

    fn model_name(&self) -> &str {
        "failing-v1"
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.succeed {
            return Err(AppError::Embedding("service unavailable".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// Offline configuration with both collections backed by text files.
pub(crate) fn offline_config(workspace: &Path) -> AppConfig {
    let mut config = AppConfig {
        workspace: workspace.to_path_buf(),
        ..AppConfig::default()
    };
    config.llm.provider = "ollama".to_string();
    config.embedding.provider = "trigram".to_string();
    config.embedding.dimensions = DIMENSIONS;
    config.embedding.batch_size = 2;
    config.chunking.chunk_size = 80;
    config.chunking.chunk_overlap = 20;
    config.timeouts.generation_secs = 1;
    config.collections = vec![
        CollectionConfig::new("oncology", "oncology.txt", "oncology_index"),
        CollectionConfig::new("neurology", "neurology.txt", "neurology_index"),
    ];
    config
}

pub(crate) fn write_sources(workspace: &Path) {
    std::fs::write(workspace.join("oncology.txt"), ONCOLOGY_TEXT).unwrap();
    std::fs::write(workspace.join("neurology.txt"), NEUROLOGY_TEXT).unwrap();
}
