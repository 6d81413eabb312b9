//! LLM provider factory.
//!
//! Builds the generation client once at startup from the configured
//! provider, endpoint and resolved credentials.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use medrag_core::config::LlmSettings;
use medrag_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client from settings.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required API
/// key is missing. Both are startup failures.
pub fn create_client(
    settings: &LlmSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider = ProviderType::parse(&settings.provider).ok_or_else(|| {
        AppError::Config(format!("Unknown provider: {}", settings.provider))
    })?;

    match provider {
        ProviderType::Ollama => {
            let client = match settings.endpoint.as_deref() {
                Some(endpoint) => OllamaClient::with_base_url(endpoint),
                None => OllamaClient::new(),
            };
            Ok(Arc::new(client))
        }
        ProviderType::OpenAI => {
            let key = api_key.ok_or_else(|| {
                AppError::Config(format!(
                    "OpenAI provider requires API key ({})",
                    settings.api_key_env
                ))
            })?;
            let client = match settings.endpoint.as_deref() {
                Some(endpoint) => OpenAiClient::with_base_url(endpoint, key),
                None => OpenAiClient::new(key),
            };
            Ok(Arc::new(client))
        }
    }
}
