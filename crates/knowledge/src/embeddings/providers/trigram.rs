//! Trigram embedding provider using hashed words and character trigrams.

use crate::embeddings::provider::EmbeddingProvider;
use medrag_core::AppResult;
use unicode_segmentation::UnicodeSegmentation;

/// Words too common to discriminate between passages.
const STOP_WORDS: &[&str] = &[
    "the", "and", "are", "was", "were", "for", "with", "from", "this", "that", "have", "has",
    "had", "its", "their", "they", "them", "which", "what", "how", "does", "can", "may",
];

/// Offline embedding provider.
///
/// Vectors are deterministic and content dependent but carry no semantics
/// beyond shared spelling. Used for development and tests where no model
/// server is available.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn slot(&self, feature: &str, seed: u64) -> usize {
        let hash = feature
            .bytes()
            .fold(seed, |acc, b| acc.wrapping_mul(0x100000001b3).wrapping_add(b as u64));
        (hash % self.dimensions as u64) as usize
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let lower = text.to_lowercase();

        for word in lower.unicode_words() {
            if word.chars().count() < 3 || STOP_WORDS.contains(&word) {
                continue;
            }

            embedding[self.slot(word, 0xcbf29ce484222325)] += 1.0;

            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.slot(&trigram, 0x84222325cbf29ce4)] += 0.5;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
