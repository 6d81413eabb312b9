//! RAG response types.

use crate::types::Chunk;
use serde::{Deserialize, Serialize};

/// Where a retrieved chunk came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source file name (e.g., "oncology.pdf")
    pub source: String,

    /// Zero-based page within the source
    pub page: u32,

    /// Chunk position within the collection
    pub position: u32,

    /// Cosine similarity to the question
    pub score: f32,
}

impl SourceRef {
    pub fn from_scored(chunk: &Chunk, score: f32) -> Self {
        Self {
            source: chunk.source_id.clone(),
            page: chunk.page,
            position: chunk.position,
            score,
        }
    }
}

/// Answer produced by one collection's retrieval-answer pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub collection: String,

    /// Generated answer; empty when nothing was retrieved
    pub answer: String,

    pub sources: Vec<SourceRef>,
}

/// One collection's contribution to an arbitrated answer.
///
/// Failed collections are recorded with an empty answer and the error text,
/// and are never informative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub collection: String,
    pub answer: String,
    pub informative: bool,
    pub sources: Vec<SourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final answer for a question plus how it was chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitratedAnswer {
    pub answer: String,

    /// Collection whose answer was returned; `None` for the fallback message
    pub selected: Option<String>,

    /// Per-collection outcomes, in configuration order
    pub outcomes: Vec<CollectionOutcome>,
}

impl ArbitratedAnswer {
    pub fn is_fallback(&self) -> bool {
        self.selected.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_omits_missing_error() {
        let outcome = CollectionOutcome {
            collection: "oncology".to_string(),
            answer: "Tamoxifen.".to_string(),
            informative: true,
            sources: Vec::new(),
            error: None,
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["informative"], true);
    }
}
