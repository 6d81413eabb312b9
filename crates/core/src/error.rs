//! Error types for MedRAG.
//!
//! One enum covers every failure category in the system. The variants follow
//! the lifecycle of a collection: configuration is checked at startup,
//! documents are loaded and embedded at build time, and retrieval and
//! generation happen per question.

use thiserror::Error;

/// Unified error type for MedRAG.
///
/// All fallible functions return `Result<T, AppError>`. Only `Config` is
/// fatal; everything else is scoped to one collection, one build or one
/// question.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing credentials or invalid collection configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source document missing, unreadable or not extractable
    #[error("Document load error: {0}")]
    DocumentLoad(String),

    /// Embedding service transport, auth or response failure
    #[error("Embedding service error: {0}")]
    Embedding(String),

    /// Vector search failure or unavailable index
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Generation model failure
    #[error("Generation error: {0}")]
    Generation(String),

    /// Persisted index exists but cannot be trusted
    #[error("Index corruption: {0}")]
    IndexCorruption(String),

    /// Index could not be written
    #[error("Index storage error: {0}")]
    Storage(String),

    /// Prompt rendering errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error must stop the process instead of degrading a
    /// single collection or request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_))
    }

    /// Short machine-readable category name, used in logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "configuration",
            AppError::DocumentLoad(_) => "document_load",
            AppError::Embedding(_) => "embedding",
            AppError::Retrieval(_) => "retrieval",
            AppError::Generation(_) => "generation",
            AppError::IndexCorruption(_) => "index_corruption",
            AppError::Storage(_) => "storage",
            AppError::Prompt(_) => "prompt",
            AppError::Io(_) => "io",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
