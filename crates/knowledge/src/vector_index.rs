//! Vector index abstraction for collection chunks.
//!
//! Indexes are immutable once loaded and are shared across concurrent
//! questions behind an `Arc`.

use crate::types::Chunk;
use medrag_core::{AppError, AppResult};
use std::cmp::Ordering;

/// Trait for read-only vector search backends.
pub trait VectorIndex: Send + Sync {
    /// Dimension every stored vector has.
    fn dimensions(&self) -> usize;

    /// Number of stored chunks.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Search for the top-k most similar chunks to the query embedding.
    ///
    /// Returns chunks ordered by descending similarity score; equal scores
    /// keep chunk position order.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(Chunk, f32)>>;
}

/// Exact cosine-similarity index held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimensions: usize,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from chunks and their embeddings.
    ///
    /// Every embedding must have `dimensions` components.
    pub fn new(dimensions: usize, entries: Vec<(Chunk, Vec<f32>)>) -> AppResult<Self> {
        let mut chunks = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());
        let mut norms = Vec::with_capacity(entries.len());

        for (chunk, vector) in entries {
            if vector.len() != dimensions {
                return Err(AppError::Retrieval(format!(
                    "Chunk {} has {} dimensions, index expects {}",
                    chunk.position,
                    vector.len(),
                    dimensions
                )));
            }
            norms.push(norm(&vector));
            chunks.push(chunk);
            vectors.push(vector);
        }

        Ok(Self {
            dimensions,
            chunks,
            vectors,
            norms,
        })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

impl VectorIndex for FlatIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    fn search(&self, query_embedding: &[f32], top_k: usize) -> AppResult<Vec<(Chunk, f32)>> {
        if query_embedding.len() != self.dimensions {
            return Err(AppError::Retrieval(format!(
                "Query has {} dimensions, index expects {}",
                query_embedding.len(),
                self.dimensions
            )));
        }

        if top_k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = norm(query_embedding);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (vector, &vector_norm))| {
                (i, cosine(query_embedding, query_norm, vector, vector_norm))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        tracing::debug!(
            "Retrieved {} chunks (requested top-{})",
            scored.len(),
            top_k
        );

        Ok(scored
            .into_iter()
            .map(|(i, score)| (self.chunks[i].clone(), score))
            .collect())
    }
}

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; zero vectors score 0.
fn cosine(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(position: u32, text: &str) -> Chunk {
        Chunk {
            position,
            source_id: "oncology.pdf".to_string(),
            page: 0,
            start: 0,
            end: text.chars().count(),
            text: text.to_string(),
            hash: String::new(),
        }
    }

    fn index() -> FlatIndex {
        FlatIndex::new(
            3,
            vec![
                (chunk(0, "x axis"), vec![1.0, 0.0, 0.0]),
                (chunk(1, "y axis"), vec![0.0, 1.0, 0.0]),
                (chunk(2, "diagonal"), vec![1.0, 1.0, 0.0]),
                (chunk(3, "x axis again"), vec![2.0, 0.0, 0.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_score() {
        let results = index().search(&[1.0, 0.1, 0.0], 3).unwrap();
        let positions: Vec<u32> = results.iter().map(|(c, _)| c.position).collect();

        // Chunks 0 and 3 point the same way and tie; position breaks the tie.
        assert_eq!(positions, vec![0, 3, 2]);
        assert!(results[0].1 >= results[2].1);
    }

    #[test]
    fn test_search_truncates_to_top_k() {
        assert_eq!(index().search(&[0.0, 1.0, 0.0], 1).unwrap().len(), 1);
        assert_eq!(index().search(&[0.0, 1.0, 0.0], 10).unwrap().len(), 4);
        assert!(index().search(&[0.0, 1.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let result = index().search(&[1.0, 0.0], 3);
        assert!(matches!(result, Err(AppError::Retrieval(_))));
    }

    #[test]
    fn test_new_rejects_wrong_dimensions() {
        let result = FlatIndex::new(2, vec![(chunk(0, "bad"), vec![1.0, 2.0, 3.0])]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = FlatIndex::new(3, Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_query_scores_zero() {
        let results = index().search(&[0.0, 0.0, 0.0], 4).unwrap();
        assert!(results.iter().all(|(_, score)| *score == 0.0));
        let positions: Vec<u32> = results.iter().map(|(c, _)| c.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }
}
