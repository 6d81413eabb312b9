//! Collection indexing and question answering for MedRAG.
//!
//! Each collection is one source document (PDF or text) with its own
//! persisted vector index. Indexes are built once, idempotently, and every
//! question is answered by all collections before an arbitrator picks the
//! single answer returned to the caller.

pub mod builder;
pub mod chunker;
pub mod context;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod rag;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use builder::IndexBuilder;
pub use context::{AppContext, CollectionState, CollectionStatus};
pub use embeddings::{create_provider, EmbeddingEngine, EmbeddingProvider};
pub use index::IndexManifest;
pub use rag::{ArbitratedAnswer, Arbitrator, CollectionOutcome, InformativenessPolicy, SourceRef};
pub use types::{BuildStats, Chunk, IndexStatus, PageText};
pub use vector_index::{FlatIndex, VectorIndex};

use medrag_core::{AppConfig, AppResult};

/// Ensure the index of every configured collection exists.
///
/// Only configuration problems fail the call; per-collection results are
/// returned in configuration order.
pub async fn ingest(config: &AppConfig) -> AppResult<Vec<(String, AppResult<IndexStatus>)>> {
    config.validate()?;

    let builder = IndexBuilder::from_config(config)?;
    Ok(builder.ensure_all(&config.collections).await)
}
