//! Configuration management for MedRAG.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults (oncology + neurology collections)
//! - Config file (`medrag.yaml` in the workspace, or `MEDRAG_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! Relative collection paths are resolved against the workspace root.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Default config file name, looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "medrag.yaml";

/// Providers that can generate answers.
const KNOWN_LLM_PROVIDERS: [&str; 2] = ["openai", "ollama"];

/// Providers that can produce embeddings.
const KNOWN_EMBEDDING_PROVIDERS: [&str; 3] = ["openai", "ollama", "trigram"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Workspace root; relative collection paths resolve against it
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Explicit API key (`MEDRAG_API_KEY`), wins over provider env vars
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,

    /// Collections in arbitration order (first wins length ties)
    pub collections: Vec<CollectionConfig>,

    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingSettings,
    pub arbitration: ArbitrationSettings,
    pub timeouts: TimeoutSettings,
    pub server: ServerSettings,
}

/// Generation model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LlmSettings {
    /// "openai" or "ollama"
    pub provider: String,
    pub model: String,
    pub endpoint: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// YAML prompt override file
    pub prompt_file: Option<PathBuf>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: None,
            prompt_file: None,
        }
    }
}

/// Embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "openai", "ollama" or "trigram"
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    /// Maximum texts per embedding request
    pub batch_size: usize,
    pub endpoint: Option<String>,
    pub api_key_env: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 100,
            endpoint: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// A named document domain with its own source document and index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionConfig {
    pub name: String,
    /// PDF, text file, or directory of documents
    pub source: PathBuf,
    /// Directory holding the persisted index
    pub index_dir: PathBuf,
}

impl CollectionConfig {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        index_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            index_dir: index_dir.into(),
        }
    }

    /// Source path resolved against the workspace.
    pub fn source_path(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.source)
    }

    /// Index directory resolved against the workspace.
    pub fn index_path(&self, workspace: &Path) -> PathBuf {
        resolve(workspace, &self.index_dir)
    }
}

fn resolve(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

fn default_collections() -> Vec<CollectionConfig> {
    vec![
        CollectionConfig::new("oncology", "oncology.pdf", "oncology_index"),
        CollectionConfig::new("neurology", "neurology.pdf", "neurology_index"),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalSettings {
    /// Chunks retrieved per collection per question
    pub top_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of one page
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ArbitrationSettings {
    /// Case-insensitive substrings that mark an answer as a refusal
    pub refusal_phrases: Vec<String>,
    /// Returned when no collection produced an informative answer
    pub fallback_message: String,
}

impl Default for ArbitrationSettings {
    fn default() -> Self {
        Self {
            refusal_phrases: vec![
                "i don't have".to_string(),
                "no information".to_string(),
                "not available".to_string(),
                "based on the provided context".to_string(),
            ],
            fallback_message: "Sorry, I couldn't find relevant information in either Oncology or Neurology documents.".to_string(),
        }
    }
}

/// Per-call timeouts for external services, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutSettings {
    pub embedding_secs: u64,
    pub generation_secs: u64,
    pub retrieval_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            embedding_secs: 30,
            generation_secs: 60,
            retrieval_secs: 10,
        }
    }
}

impl TimeoutSettings {
    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }

    pub fn retrieval(&self) -> Duration {
        Duration::from_secs(self.retrieval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    llm: Option<LlmSettings>,
    embedding: Option<EmbeddingSettings>,
    collections: Option<Vec<CollectionConfig>>,
    retrieval: Option<RetrievalSettings>,
    chunking: Option<ChunkingSettings>,
    arbitration: Option<ArbitrationSettings>,
    timeouts: Option<TimeoutSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: LlmSettings::default(),
            embedding: EmbeddingSettings::default(),
            collections: default_collections(),
            retrieval: RetrievalSettings::default(),
            chunking: ChunkingSettings::default(),
            arbitration: ArbitrationSettings::default(),
            timeouts: TimeoutSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `MEDRAG_WORKSPACE`: Override workspace path
    /// - `MEDRAG_CONFIG`: Path to config file
    /// - `MEDRAG_PROVIDER` / `MEDRAG_MODEL`: Generation provider and model
    /// - `MEDRAG_EMBEDDING_PROVIDER` / `MEDRAG_EMBEDDING_MODEL`: Embedding provider and model
    /// - `MEDRAG_API_KEY`: API key for every provider
    /// - `MEDRAG_BIND`: Server bind address
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use medrag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Collections: {}", config.collections.len());
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("MEDRAG_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("MEDRAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(CONFIG_FILE_NAME));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("MEDRAG_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("MEDRAG_MODEL") {
            config.llm.model = model;
        }
        if let Ok(provider) = std::env::var("MEDRAG_EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(model) = std::env::var("MEDRAG_EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(bind) = std::env::var("MEDRAG_BIND") {
            config.server.bind = bind;
        }

        config.api_key = std::env::var("MEDRAG_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        tracing::debug!("Loading config file {:?}", path);
        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config file {:?}: {}", path, e)))
    }

    /// Merge YAML configuration text into this config.
    ///
    /// Sections absent from the YAML keep their current values; fields absent
    /// from a present section take their defaults.
    pub fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = if contents.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml::from_str(contents)
                .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?
        };

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(embedding) = config_file.embedding {
            result.embedding = embedding;
        }
        if let Some(collections) = config_file.collections {
            result.collections = collections;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(chunking) = config_file.chunking {
            result.chunking = chunking;
        }
        if let Some(arbitration) = config_file.arbitration {
            result.arbitration = arbitration;
        }
        if let Some(timeouts) = config_file.timeouts {
            result.timeouts = timeouts;
        }
        if let Some(server) = config_file.server {
            result.server = server;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.llm.provider = provider;
        }

        if let Some(model) = model {
            self.llm.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Resolve the generation API key.
    pub fn llm_api_key(&self) -> Option<String> {
        self.resolve_api_key(&self.llm.api_key_env)
    }

    /// Resolve the embedding API key.
    pub fn embedding_api_key(&self) -> Option<String> {
        self.resolve_api_key(&self.embedding.api_key_env)
    }

    fn resolve_api_key(&self, env_var: &str) -> Option<String> {
        // Check explicit MEDRAG_API_KEY first
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        std::env::var(env_var).ok().filter(|k| !k.trim().is_empty())
    }

    /// Look up a collection by name.
    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Validate the startup contract.
    ///
    /// Credentials must be resolvable and the collection set must be usable
    /// before any index build or query is attempted.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_LLM_PROVIDERS.contains(&self.llm.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.llm.provider,
                KNOWN_LLM_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                self.embedding.provider,
                KNOWN_EMBEDDING_PROVIDERS.join(", ")
            )));
        }

        if self.llm.provider == "openai" && self.llm_api_key().is_none() {
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                self.llm.api_key_env
            )));
        }

        if self.embedding.provider == "openai" && self.embedding_api_key().is_none() {
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                self.embedding.api_key_env
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batch size must be greater than zero".to_string(),
            ));
        }

        if self.collections.is_empty() {
            return Err(AppError::Config("No collections configured".to_string()));
        }

        let mut names = HashSet::new();
        let mut index_dirs = HashSet::new();
        for collection in &self.collections {
            if collection.name.trim().is_empty() {
                return Err(AppError::Config("Collection name is empty".to_string()));
            }
            if !names.insert(collection.name.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate collection name: {}",
                    collection.name
                )));
            }
            if !index_dirs.insert(collection.index_path(&self.workspace)) {
                return Err(AppError::Config(format!(
                    "Collection '{}' shares its index location with another collection",
                    collection.name
                )));
            }
        }

        if self.chunking.chunk_size == 0 {
            return Err(AppError::Config(
                "Chunk size must be greater than zero".to_string(),
            ));
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(AppError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }

        if self.retrieval.top_k == 0 {
            return Err(AppError::Config(
                "top_k must be greater than zero".to_string(),
            ));
        }

        if self.arbitration.fallback_message.trim().is_empty() {
            return Err(AppError::Config(
                "Arbitration fallback message must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
