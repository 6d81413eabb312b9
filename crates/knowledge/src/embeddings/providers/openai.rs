//! OpenAI embeddings provider.
//!
//! API: https://platform.openai.com/docs/api-reference/embeddings

use crate::embeddings::EmbeddingProvider;
use async_trait::async_trait;
use medrag_core::config::EmbeddingSettings;
use medrag_core::{AppError, AppResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI (or compatible) `/embeddings` client.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiProvider {
    pub fn new(settings: &EmbeddingSettings, api_key: impl Into<String>) -> Self {
        let base_url = settings
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_URL)
            .trim_end_matches('/')
            .to_string();

        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        }
    }

    /// Order embeddings by their `index` and check the count.
    fn order_embeddings(
        &self,
        response: EmbeddingResponse,
        expected: usize,
    ) -> AppResult<Vec<Vec<f32>>> {
        let mut data = response.data;
        if data.len() != expected {
            return Err(AppError::Embedding(format!(
                "OpenAI returned {} embeddings for {} inputs",
                data.len(),
                expected
            )));
        }

        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(AppError::Embedding(
                "OpenAI returned embeddings with inconsistent indices".to_string(),
            ));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            model = %self.model,
            count = texts.len(),
            "Sending embeddings request to OpenAI"
        );

        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| {
                AppError::Embedding(format!("Failed to send request to OpenAI: {}", e))
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Embedding(format!(
                "OpenAI authentication failed ({})",
                status
            )));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Embedding(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::Embedding(format!("Failed to parse OpenAI response: {}", e))
        })?;

        self.order_embeddings(body, texts.len())
    }
}
