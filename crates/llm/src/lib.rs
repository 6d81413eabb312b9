//! Generation boundary for MedRAG.
//!
//! This crate provides a provider-agnostic abstraction for calling the
//! models that turn a question plus retrieved context into an answer.
//!
//! # Providers
//! - **OpenAI**: chat completions API (default)
//! - **Ollama**: local LLM runtime
//!
//! # Example
//! ```no_run
//! use medrag_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("What is TNM staging?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use types::ProviderType;
