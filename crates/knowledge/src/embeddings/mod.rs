//! Embedding engine for collections.
//!
//! Wraps one provider with the batching and timeout rules shared by index
//! builds and question embedding.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};

use medrag_core::config::{EmbeddingSettings, TimeoutSettings};
use medrag_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Duration;

/// Provider plus the batch size and per-call timeout it is driven with.
#[derive(Debug, Clone)]
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    timeout: Duration,
}

impl EmbeddingEngine {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize, timeout: Duration) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            timeout,
        }
    }

    /// Build the configured provider and wrap it.
    pub fn from_settings(
        settings: &EmbeddingSettings,
        timeouts: &TimeoutSettings,
        api_key: Option<&str>,
    ) -> AppResult<Self> {
        let provider = create_provider(settings, api_key)?;
        Ok(Self::new(provider, settings.batch_size, timeouts.embedding()))
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    /// Number of provider calls needed to embed `count` texts.
    pub fn batch_count(&self, count: usize) -> usize {
        count.div_ceil(self.batch_size)
    }

    /// Embed texts in batches, preserving input order.
    pub async fn embed_texts(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Embedding {} texts using provider '{}' (model: {})",
            texts.len(),
            self.provider.provider_name(),
            self.provider.model_name()
        );

        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!("Embedding batch {} ({} texts)", i + 1, batch.len());
            embeddings.extend(self.embed_batch(batch).await?);
        }

        Ok(embeddings)
    }

    /// Embed a single question.
    pub async fn embed_query(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, batch: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let embeddings = tokio::time::timeout(self.timeout, self.provider.embed_batch(batch))
            .await
            .map_err(|_| {
                AppError::Embedding(format!(
                    "Embedding request timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })??;

        if embeddings.len() != batch.len() {
            return Err(AppError::Embedding(format!(
                "Provider returned {} embeddings for {} texts",
                embeddings.len(),
                batch.len()
            )));
        }

        let dimensions = self.provider.dimensions();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(AppError::Embedding(format!(
                "Unexpected embedding dimensions: got {}, expected {}",
                bad.len(),
                dimensions
            )));
        }

        Ok(embeddings)
    }
}
