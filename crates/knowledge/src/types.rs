//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};

/// Text extracted from one page of a source document.
///
/// Text files yield a single page unless they contain form feeds. PDFs yield
/// one page per form feed separated block of `pdftotext` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    /// File name of the document the page comes from
    pub source_id: String,

    /// Zero-based page number within the document
    pub page: u32,

    pub text: String,
}

impl PageText {
    pub fn new(source_id: impl Into<String>, page: u32, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            page,
            text: text.into(),
        }
    }
}

/// A contiguous span of one page, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position within the collection; doubles as the vector slot id
    pub position: u32,

    pub source_id: String,

    pub page: u32,

    /// Character offset of the first character within the page
    pub start: usize,

    /// Character offset one past the last character within the page
    pub end: usize,

    pub text: String,

    /// SHA-256 of the chunk text, hex encoded
    pub hash: String,
}

impl Chunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Outcome of an idempotent index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexStatus {
    /// The marker was present; nothing was read, embedded or written
    AlreadyPresent,
    Built(BuildStats),
}

impl IndexStatus {
    pub fn was_built(&self) -> bool {
        matches!(self, IndexStatus::Built(_))
    }
}

/// Statistics from building one collection index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildStats {
    pub pages: usize,
    pub chunks: usize,
    pub embedding_batches: usize,
    pub duration_secs: f64,
}
