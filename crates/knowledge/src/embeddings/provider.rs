//! Embedding provider trait and factory.

use crate::embeddings::providers::{OllamaProvider, OpenAiProvider, TrigramProvider};
use medrag_core::config::EmbeddingSettings;
use medrag_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "openai", "ollama", "trigram")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match settings.provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(settings.dimensions))),

        "ollama" => Ok(Arc::new(OllamaProvider::new(settings)?)),

        "openai" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config(format!(
                    "API key not found in environment variable: {}",
                    settings.api_key_env
                ))
            })?;
            Ok(Arc::new(OpenAiProvider::new(settings, api_key)))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: openai, ollama, trigram",
            settings.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: provider.to_string(),
            dimensions: 64,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_trigram_provider() {
        let provider = create_provider(&settings("trigram"), None).unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
        assert_eq!(provider.dimensions(), 64);
    }

    #[test]
    fn test_create_openai_provider_requires_key() {
        let result = create_provider(&settings("openai"), None);
        assert!(matches!(result, Err(AppError::Config(_))));

        let provider = create_provider(&settings("openai"), Some("sk-test")).unwrap();
        assert_eq!(provider.provider_name(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = create_provider(&settings("gguf"), None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&settings("trigram"), None).unwrap();

        let embedding = provider.embed("temozolomide").await.unwrap();
        assert_eq!(embedding.len(), 64);
    }
}
