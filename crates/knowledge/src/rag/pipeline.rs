//! Retrieval-answer pipeline for a single collection.
//!
//! A question is embedded, the top-k chunks are retrieved from the
//! collection's index, and the generation model answers from those chunks
//! only. Every external call runs under its own timeout.

use crate::embeddings::EmbeddingEngine;
use crate::rag::types::{QueryResult, SourceRef};
use crate::types::Chunk;
use crate::vector_index::VectorIndex;
use async_trait::async_trait;
use medrag_core::{AppConfig, AppError, AppResult};
use medrag_llm::{LlmClient, LlmRequest};
use medrag_prompt::{build_prompt, load_prompt, PromptChunk, PromptDefinition};
use std::sync::Arc;
use std::time::Duration;

/// Something that can answer a question from one collection.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    /// Collection name
    fn name(&self) -> &str;

    async fn query(&self, question: &str) -> AppResult<QueryResult>;
}

/// Answer generation from retrieved chunks.
pub struct Generator {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    prompt: PromptDefinition,
    timeout: Duration,
}

impl Generator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            prompt: PromptDefinition::default(),
            timeout,
        }
    }

    /// Generator configured from the `llm` and `timeouts` sections.
    ///
    /// An unreadable prompt file is a configuration error.
    pub fn from_config(config: &AppConfig, client: Arc<dyn LlmClient>) -> AppResult<Self> {
        let prompt = match config.llm.prompt_file {
            Some(ref path) => load_prompt(&config.workspace.join(path)).map_err(|e| {
                AppError::Config(format!("Failed to load prompt file {:?}: {}", path, e))
            })?,
            None => PromptDefinition::default(),
        };

        let generator = Self::new(
            client,
            config.llm.model.clone(),
            config.timeouts.generation(),
        )
        .with_temperature(config.llm.temperature)
        .with_prompt(prompt);

        Ok(match config.llm.max_tokens {
            Some(max_tokens) => generator.with_max_tokens(max_tokens),
            None => generator,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    /// Generate an answer grounded in the given chunks.
    pub async fn generate(&self, question: &str, chunks: &[(Chunk, f32)]) -> AppResult<String> {
        let context: Vec<PromptChunk> = chunks
            .iter()
            .map(|(chunk, _)| PromptChunk {
                source: chunk.source_id.clone(),
                page: chunk.page + 1,
                text: chunk.text.clone(),
            })
            .collect();

        let built = build_prompt(&self.prompt, question, &context)
            .map_err(|e| AppError::Generation(format!("Failed to render prompt: {}", e)))?;

        let mut request = LlmRequest::new(built.user, self.model.clone())
            .with_temperature(self.temperature);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        tracing::debug!(
            "Generating answer with {} (model: {}, {} chunks)",
            self.client.provider_name(),
            self.model,
            chunks.len()
        );

        let response = tokio::time::timeout(self.timeout, self.client.complete(&request))
            .await
            .map_err(|_| {
                AppError::Generation(format!(
                    "Generation timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })??;

        Ok(response.content.trim().to_string())
    }
}

/// Retrieval plus generation over one loaded index.
pub struct CollectionPipeline {
    name: String,
    index: Arc<dyn VectorIndex>,
    embedder: EmbeddingEngine,
    generator: Arc<Generator>,
    top_k: usize,
    retrieval_timeout: Duration,
}

impl CollectionPipeline {
    pub fn new(
        name: impl Into<String>,
        index: Arc<dyn VectorIndex>,
        embedder: EmbeddingEngine,
        generator: Arc<Generator>,
        top_k: usize,
        retrieval_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            embedder,
            generator,
            top_k,
            retrieval_timeout,
        }
    }

    async fn retrieve(&self, vector: Vec<f32>) -> AppResult<Vec<(Chunk, f32)>> {
        let index = Arc::clone(&self.index);
        let top_k = self.top_k;
        let search = tokio::task::spawn_blocking(move || index.search(&vector, top_k));

        tokio::time::timeout(self.retrieval_timeout, search)
            .await
            .map_err(|_| {
                AppError::Retrieval(format!(
                    "Search timed out after {}s",
                    self.retrieval_timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| AppError::Retrieval(format!("Search task failed: {}", e)))?
    }
}

#[async_trait]
impl AnswerSource for CollectionPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, question: &str) -> AppResult<QueryResult> {
        let vector = self.embedder.embed_query(question).await?;
        let results = self.retrieve(vector).await?;
        let sources = results
            .iter()
            .map(|(chunk, score)| SourceRef::from_scored(chunk, *score))
            .collect();

        if results.is_empty() {
            tracing::debug!("No chunks retrieved from '{}', skipping generation", self.name);
            return Ok(QueryResult {
                collection: self.name.clone(),
                answer: String::new(),
                sources,
            });
        }

        let answer = self.generator.generate(question, &results).await?;

        Ok(QueryResult {
            collection: self.name.clone(),
            answer,
            sources,
        })
    }
}

/// Stand-in for a collection whose index could not be built or loaded.
pub struct UnavailableCollection {
    name: String,
    reason: String,
}

impl UnavailableCollection {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl AnswerSource for UnavailableCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, _question: &str) -> AppResult<QueryResult> {
        Err(AppError::Retrieval(format!(
            "index unavailable: {}",
            self.reason
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::vector_index::FlatIndex;
    use medrag_llm::{LlmResponse, LlmUsage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        calls: AtomicUsize,
        last_prompt: Mutex<Option<LlmRequest>>,
    }

    #[async_trait]
    impl LlmClient for RecordingClient {
        fn provider_name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(request.clone());
            Ok(LlmResponse {
                content: "  Temozolomide is used with radiotherapy.\n".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    fn engine() -> EmbeddingEngine {
        EmbeddingEngine::new(Arc::new(TrigramProvider::new(64)), 16, Duration::from_secs(5))
    }

    fn chunk(position: u32, text: &str) -> Chunk {
        Chunk {
            position,
            source_id: "neurology.pdf".to_string(),
            page: 4,
            start: 0,
            end: text.chars().count(),
            text: text.to_string(),
            hash: String::new(),
        }
    }

    async fn index(texts: &[&str]) -> Arc<dyn VectorIndex> {
        let strings: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let vectors = engine().embed_texts(&strings).await.unwrap();
        let entries = texts
            .iter()
            .enumerate()
            .map(|(i, t)| chunk(i as u32, t))
            .zip(vectors)
            .collect();
        Arc::new(FlatIndex::new(64, entries).unwrap())
    }

    #[tokio::test]
    async fn test_query_generates_from_retrieved_chunks() {
        let client = Arc::new(RecordingClient::default());
        let generator = Arc::new(Generator::new(
            client.clone(),
            "gpt-4o-mini",
            Duration::from_secs(5),
        ));
        let index = index(&[
            "Glioblastoma is treated with temozolomide and radiotherapy.",
            "Migraine prophylaxis includes beta blockers.",
        ])
        .await;

        let pipeline = CollectionPipeline::new(
            "neurology",
            index,
            engine(),
            generator,
            1,
            Duration::from_secs(5),
        );

        let result = pipeline.query("How is glioblastoma treated?").await.unwrap();
        assert_eq!(result.collection, "neurology");
        assert_eq!(result.answer, "Temozolomide is used with radiotherapy.");
        assert_eq!(result.sources.len(), 1);
        assert_eq!(result.sources[0].position, 0);

        let request = client.last_prompt.lock().unwrap().clone().unwrap();
        assert!(request.prompt.contains("temozolomide and radiotherapy"));
        assert!(request.prompt.contains("[neurology.pdf, page 5]"));
        assert!(request.prompt.contains("How is glioblastoma treated?"));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_from_config_applies_max_tokens() {
        let client = Arc::new(RecordingClient::default());
        let mut config = AppConfig::default();
        config.llm.max_tokens = Some(256);
        config.llm.temperature = 0.2;

        let generator = Generator::from_config(&config, client.clone()).unwrap();
        let chunks = vec![(chunk(0, "Triptans treat acute migraine."), 0.9)];
        generator.generate("How is migraine treated?", &chunks).await.unwrap();

        let request = client.last_prompt.lock().unwrap().clone().unwrap();
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.temperature, Some(0.2));
    }

    #[tokio::test]
    async fn test_empty_index_skips_generation() {
        let client = Arc::new(RecordingClient::default());
        let generator = Arc::new(Generator::new(
            client.clone(),
            "gpt-4o-mini",
            Duration::from_secs(5),
        ));
        let pipeline = CollectionPipeline::new(
            "oncology",
            Arc::new(FlatIndex::new(64, Vec::new()).unwrap()),
            engine(),
            generator,
            3,
            Duration::from_secs(5),
        );

        let result = pipeline.query("What is TNM staging?").await.unwrap();
        assert_eq!(result.answer, "");
        assert!(result.sources.is_empty());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_collection_fails_with_retrieval_error() {
        let source = UnavailableCollection::new("oncology", "source document not found");
        assert_eq!(source.name(), "oncology");

        let err = source.query("anything").await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval(_)));
        assert!(err.to_string().contains("index unavailable"));
    }
}
