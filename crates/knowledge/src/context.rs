//! Application context.
//!
//! Holds everything a question needs once startup has finished: the loaded
//! collection indexes, the generation client and the arbitrator. Clients are
//! created exactly once here and shared by every collection.

use crate::builder::IndexBuilder;
use crate::embeddings::{EmbeddingEngine, EmbeddingProvider};
use crate::rag::{
    AnswerSource, Arbitrator, ArbitratedAnswer, CollectionPipeline, Generator,
    UnavailableCollection,
};
use futures::future::join_all;
use medrag_core::{AppConfig, AppResult};
use medrag_llm::{create_client, LlmClient};
use serde::Serialize;
use std::sync::Arc;

/// Startup state of one collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionState {
    pub name: String,
    pub status: CollectionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CollectionStatus {
    /// Index loaded; `built` is true when it was built during this startup
    Ready { chunks: usize, built: bool },

    /// Index could not be built or loaded; queries always fail
    Unavailable { reason: String },
}

impl CollectionState {
    pub fn is_ready(&self) -> bool {
        matches!(self.status, CollectionStatus::Ready { .. })
    }
}

/// Initialized application, ready to answer questions.
pub struct AppContext {
    config: AppConfig,
    arbitrator: Arbitrator,
    collections: Vec<CollectionState>,
}

impl AppContext {
    /// Validate the configuration, create the clients and open every
    /// collection.
    ///
    /// Configuration and credential problems are fatal. A collection whose
    /// index cannot be built or loaded is kept as unavailable so the other
    /// collections still serve.
    pub async fn initialize(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let builder = IndexBuilder::from_config(&config)?;
        let llm = create_client(&config.llm, config.llm_api_key().as_deref())?;

        Self::assemble(config, builder, llm).await
    }

    /// Initialize with caller-supplied embedding and generation clients.
    pub async fn with_clients(
        config: AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
    ) -> AppResult<Self> {
        config.validate()?;

        let engine = EmbeddingEngine::new(
            embedder,
            config.embedding.batch_size,
            config.timeouts.embedding(),
        );
        let builder = IndexBuilder::new(config.workspace.clone(), engine, config.chunking.clone());

        Self::assemble(config, builder, llm).await
    }

    async fn assemble(
        config: AppConfig,
        builder: IndexBuilder,
        llm: Arc<dyn LlmClient>,
    ) -> AppResult<Self> {
        let generator = Arc::new(Generator::from_config(&config, llm)?);

        let opened = join_all(
            config
                .collections
                .iter()
                .map(|collection| builder.open_or_rebuild(collection)),
        )
        .await;

        let mut sources: Vec<Arc<dyn AnswerSource>> = Vec::with_capacity(opened.len());
        let mut collections = Vec::with_capacity(opened.len());

        for (collection, result) in config.collections.iter().zip(opened) {
            match result {
                Ok((status, manifest, index)) => {
                    tracing::info!(
                        collection = %collection.name,
                        chunks = manifest.chunk_count,
                        "Collection ready"
                    );
                    collections.push(CollectionState {
                        name: collection.name.clone(),
                        status: CollectionStatus::Ready {
                            chunks: manifest.chunk_count,
                            built: status.was_built(),
                        },
                    });
                    sources.push(Arc::new(CollectionPipeline::new(
                        collection.name.clone(),
                        Arc::new(index),
                        builder.embedder().clone(),
                        Arc::clone(&generator),
                        config.retrieval.top_k,
                        config.timeouts.retrieval(),
                    )));
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %collection.name,
                        kind = e.kind(),
                        "Collection unavailable: {}",
                        e
                    );
                    collections.push(CollectionState {
                        name: collection.name.clone(),
                        status: CollectionStatus::Unavailable {
                            reason: e.to_string(),
                        },
                    });
                    sources.push(Arc::new(UnavailableCollection::new(
                        collection.name.clone(),
                        e.to_string(),
                    )));
                }
            }
        }

        let arbitrator = Arbitrator::from_settings(sources, &config.arbitration);

        Ok(Self {
            config,
            arbitrator,
            collections,
        })
    }

    /// Answer a question across every collection.
    ///
    /// A blank question gets the fallback message without querying anything.
    pub async fn answer(&self, question: &str) -> ArbitratedAnswer {
        let question = question.trim();
        if question.is_empty() {
            return ArbitratedAnswer {
                answer: self.arbitrator.fallback_message().to_string(),
                selected: None,
                outcomes: Vec::new(),
            };
        }

        tracing::info!("Answering question across {} collections", self.collections.len());
        self.arbitrator.answer(question).await
    }

    pub async fn answer_text(&self, question: &str) -> String {
        self.answer(question).await.answer
    }

    pub fn collections(&self) -> &[CollectionState] {
        &self.collections
    }

    pub fn fallback_message(&self) -> &str {
        self.arbitrator.fallback_message()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
