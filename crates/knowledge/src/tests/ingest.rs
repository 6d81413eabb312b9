//! Idempotent ingestion and index recovery.

use super::*;
use crate::builder::IndexBuilder;
use crate::context::{AppContext, CollectionStatus};
use crate::embeddings::EmbeddingEngine;
use crate::index;
use crate::types::IndexStatus;
use medrag_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Silent;

#[async_trait]
impl LlmClient for Silent {
    fn provider_name(&self) -> &str {
        "silent"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        Ok(LlmResponse {
            content: String::new(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

fn engine(provider: Arc<dyn EmbeddingProvider>) -> EmbeddingEngine {
    EmbeddingEngine::new(provider, 2, Duration::from_secs(5))
}

#[tokio::test]
async fn test_second_startup_does_no_embedding_or_writing() {
    let temp = TempDir::new().unwrap();
    write_sources(temp.path());
    let config = offline_config(temp.path());

    let first = Arc::new(CountingProvider::new());
    let context = AppContext::with_clients(config.clone(), first.clone(), Arc::new(Silent))
        .await
        .unwrap();
    assert!(first.batches() > 0);
    assert!(context.collections().iter().all(|c| matches!(
        c.status,
        CollectionStatus::Ready { built: true, .. }
    )));

    let marker = index::index_file(&temp.path().join("oncology_index"));
    let modified = std::fs::metadata(&marker).unwrap().modified().unwrap();

    let second = Arc::new(CountingProvider::new());
    let context = AppContext::with_clients(config, second.clone(), Arc::new(Silent))
        .await
        .unwrap();
    assert_eq!(second.batches(), 0);
    assert!(context.collections().iter().all(|c| matches!(
        c.status,
        CollectionStatus::Ready { built: false, .. }
    )));
    assert_eq!(
        std::fs::metadata(&marker).unwrap().modified().unwrap(),
        modified
    );
}

#[tokio::test]
async fn test_marker_presence_alone_skips_ingest() {
    let temp = TempDir::new().unwrap();
    write_sources(temp.path());
    let config = offline_config(temp.path());
    let collection = &config.collections[0];

    let provider = Arc::new(CountingProvider::new());
    let builder = IndexBuilder::new(
        temp.path(),
        engine(provider.clone()),
        config.chunking.clone(),
    );
    builder.ensure_index(collection).await.unwrap();
    let built = provider.batches();

    // Changing the source does not trigger a rebuild.
    std::fs::write(temp.path().join("oncology.txt"), "Replaced content.").unwrap();
    let status = builder.ensure_index(collection).await.unwrap();
    assert_eq!(status, IndexStatus::AlreadyPresent);
    assert_eq!(provider.batches(), built);
}

#[tokio::test]
async fn test_failed_build_leaves_no_marker() {
    let temp = TempDir::new().unwrap();
    write_sources(temp.path());
    let config = offline_config(temp.path());
    let collection = &config.collections[1];

    let builder = IndexBuilder::new(
        temp.path(),
        engine(Arc::new(FailingProvider::after(1))),
        config.chunking.clone(),
    );

    let result = builder.ensure_index(collection).await;
    assert!(matches!(result, Err(AppError::Embedding(_))));

    let dir = temp.path().join("neurology_index");
    assert!(!index::index_exists(&dir));
    if dir.exists() {
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    // A later run with a working provider completes the build.
    let builder = IndexBuilder::new(
        temp.path(),
        engine(Arc::new(CountingProvider::new())),
        config.chunking.clone(),
    );
    assert!(builder.ensure_index(collection).await.unwrap().was_built());
    assert!(index::index_exists(&dir));
}

#[tokio::test]
async fn test_startup_rebuilds_corrupt_index() {
    let temp = TempDir::new().unwrap();
    write_sources(temp.path());
    let config = offline_config(temp.path());

    let dir = temp.path().join("oncology_index");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(index::index_file(&dir), b"SQLite format 3\0 but truncated").unwrap();

    let context = AppContext::with_clients(
        config,
        Arc::new(CountingProvider::new()),
        Arc::new(Silent),
    )
    .await
    .unwrap();

    let oncology = &context.collections()[0];
    assert!(matches!(
        oncology.status,
        CollectionStatus::Ready { built: true, .. }
    ));
    let manifest = index::read_manifest(&dir).unwrap();
    assert_eq!(manifest.collection, "oncology");
    assert!(manifest.chunk_count > 0);
}

#[tokio::test]
async fn test_ingest_reports_each_collection() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("oncology.txt"), ONCOLOGY_TEXT).unwrap();
    let config = offline_config(temp.path());

    let results = crate::ingest(&config).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].1.as_ref().unwrap().was_built());
    assert!(matches!(results[1].1, Err(AppError::DocumentLoad(_))));

    let results = crate::ingest(&config).await.unwrap();
    assert_eq!(results[0].1.as_ref().unwrap(), &IndexStatus::AlreadyPresent);
}
