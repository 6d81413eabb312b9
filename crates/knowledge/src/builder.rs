//! Idempotent index building.
//!
//! `ensure_index` is the single ingestion entry point. It does nothing when
//! the collection's marker file exists; otherwise it loads the source, chunks
//! it, embeds every chunk and publishes the index atomically.

use crate::chunker::split_pages;
use crate::embeddings::EmbeddingEngine;
use crate::index::{self, IndexManifest, FORMAT_VERSION};
use crate::loader::load_document;
use crate::types::{BuildStats, IndexStatus, PageText};
use crate::vector_index::FlatIndex;
use chrono::Utc;
use futures::future::join_all;
use medrag_core::config::{ChunkingSettings, CollectionConfig};
use medrag_core::{AppConfig, AppError, AppResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Builds and loads collection indexes for one workspace.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    workspace: PathBuf,
    embedder: EmbeddingEngine,
    chunking: ChunkingSettings,
}

impl IndexBuilder {
    pub fn new(
        workspace: impl Into<PathBuf>,
        embedder: EmbeddingEngine,
        chunking: ChunkingSettings,
    ) -> Self {
        Self {
            workspace: workspace.into(),
            embedder,
            chunking,
        }
    }

    /// Builder for the configured workspace, embedding provider and chunking.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let embedder = EmbeddingEngine::from_settings(
            &config.embedding,
            &config.timeouts,
            config.embedding_api_key().as_deref(),
        )?;
        Ok(Self::new(
            config.workspace.clone(),
            embedder,
            config.chunking.clone(),
        ))
    }

    pub fn embedder(&self) -> &EmbeddingEngine {
        &self.embedder
    }

    pub fn index_dir(&self, collection: &CollectionConfig) -> PathBuf {
        collection.index_path(&self.workspace)
    }

    /// Build the collection index unless a valid marker already exists.
    pub async fn ensure_index(&self, collection: &CollectionConfig) -> AppResult<IndexStatus> {
        let dir = self.index_dir(collection);

        if index::index_exists(&dir) {
            tracing::info!(
                "Index for '{}' already exists at {:?}, skipping ingest",
                collection.name,
                dir
            );
            return Ok(IndexStatus::AlreadyPresent);
        }

        let stats = self.build(collection, &dir).await?;
        Ok(IndexStatus::Built(stats))
    }

    /// Ensure every collection concurrently. One failure never affects the
    /// others; results keep configuration order.
    pub async fn ensure_all(
        &self,
        collections: &[CollectionConfig],
    ) -> Vec<(String, AppResult<IndexStatus>)> {
        let builds = collections.iter().map(|collection| async move {
            let result = self.ensure_index(collection).await;
            if let Err(ref e) = result {
                tracing::warn!(
                    collection = %collection.name,
                    kind = e.kind(),
                    "Index build failed: {}",
                    e
                );
            }
            (collection.name.clone(), result)
        });

        join_all(builds).await
    }

    /// Ensure the index, then load it; a corrupt index is removed and rebuilt
    /// once.
    pub async fn open_or_rebuild(
        &self,
        collection: &CollectionConfig,
    ) -> AppResult<(IndexStatus, IndexManifest, FlatIndex)> {
        let status = self.ensure_index(collection).await?;
        let dir = self.index_dir(collection);

        match load_blocking(dir.clone()).await {
            Ok((manifest, index)) => {
                self.check_compatible(collection, &manifest);
                Ok((status, manifest, index))
            }
            Err(AppError::IndexCorruption(reason)) => {
                tracing::warn!(
                    collection = %collection.name,
                    "Index at {:?} is corrupt ({}), rebuilding",
                    dir,
                    reason
                );
                index::remove_index(&dir)?;
                let status = self.ensure_index(collection).await?;
                let (manifest, index) = load_blocking(dir).await?;
                Ok((status, manifest, index))
            }
            Err(e) => Err(e),
        }
    }

    async fn build(&self, collection: &CollectionConfig, dir: &Path) -> AppResult<BuildStats> {
        let start = Instant::now();
        let source = collection.source_path(&self.workspace);

        tracing::info!(
            "Building index for '{}' from {:?}",
            collection.name,
            source
        );

        let pages = load_document(&source).await?;
        let chunks = split_pages(&pages, &self.chunking);

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_texts(&texts).await?;

        let provider = self.embedder.provider();
        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            collection: collection.name.clone(),
            embedding_provider: provider.provider_name().to_string(),
            embedding_model: provider.model_name().to_string(),
            dimensions: provider.dimensions(),
            chunk_count: chunks.len(),
            source_fingerprint: fingerprint(&pages),
            built_at: Utc::now(),
        };

        let stats = BuildStats {
            pages: pages.len(),
            chunks: chunks.len(),
            embedding_batches: self.embedder.batch_count(chunks.len()),
            duration_secs: 0.0,
        };

        let entries: Vec<_> = chunks.into_iter().zip(embeddings).collect();
        let target = dir.to_path_buf();
        tokio::task::spawn_blocking(move || index::write_index(&target, &manifest, &entries))
            .await
            .map_err(|e| AppError::Storage(format!("index writer task failed: {}", e)))??;

        let stats = BuildStats {
            duration_secs: start.elapsed().as_secs_f64(),
            ..stats
        };

        tracing::info!(
            "Built index for '{}': {} pages, {} chunks in {:.2}s",
            collection.name,
            stats.pages,
            stats.chunks,
            stats.duration_secs
        );

        Ok(stats)
    }

    /// Warn when the stored index was built with a different embedding model.
    fn check_compatible(&self, collection: &CollectionConfig, manifest: &IndexManifest) {
        let provider = self.embedder.provider();
        if manifest.embedding_provider != provider.provider_name()
            || manifest.embedding_model != provider.model_name()
            || manifest.dimensions != provider.dimensions()
        {
            tracing::warn!(
                collection = %collection.name,
                "Index was built with {}/{} ({} dims) but the configured embedder is {}/{} ({} dims); delete {:?} to rebuild",
                manifest.embedding_provider,
                manifest.embedding_model,
                manifest.dimensions,
                provider.provider_name(),
                provider.model_name(),
                provider.dimensions(),
                self.index_dir(collection)
            );
        }
    }
}

async fn load_blocking(dir: PathBuf) -> AppResult<(IndexManifest, FlatIndex)> {
    tokio::task::spawn_blocking(move || index::load_index(&dir))
        .await
        .map_err(|e| AppError::Retrieval(format!("index loader task failed: {}", e)))?
}

/// SHA-256 over every page, each prefixed by its provenance.
fn fingerprint(pages: &[PageText]) -> String {
    let mut hasher = Sha256::new();
    for page in pages {
        hasher.update(page.source_id.as_bytes());
        hasher.update(page.page.to_le_bytes());
        hasher.update((page.text.len() as u64).to_le_bytes());
        hasher.update(page.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
