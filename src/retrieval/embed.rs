//! Deterministic hash-based embedder.
//!
//! Produces reproducible pseudo-embeddings from word-level and character
//! trigram hashing, L2-normalized so inner product equals cosine
//! similarity. This captures lexical overlap, not semantics; a real dense
//! engine replaces it through the [`DenseIndex`](crate::retrieval::DenseIndex)
//! trait.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Default embedding dimensionality.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Deterministic hash embedder.
///
/// # Examples
///
/// ```
/// use citeseek::retrieval::HashEmbedder;
///
/// let embedder = HashEmbedder::new(384);
/// assert_eq!(embedder.embed("hello world"), embedder.embed("hello world"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates an embedder with the given dimensionality.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Embedding dimensionality.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn hash_string(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }

    /// Embeds text into an L2-normalized vector.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let normalized: String = text
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() {
                    c.to_ascii_lowercase()
                } else {
                    ' '
                }
            })
            .collect();

        // Word-level hashing (primary signal)
        for word in normalized.split_whitespace() {
            let hash = Self::hash_string(word);
            let idx = (hash as usize) % self.dimensions;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            let magnitude = 1.0 + ((hash >> 16) & 0xFF) as f32 / 255.0;
            embedding[idx] += sign * magnitude;
        }

        // Character trigram hashing (secondary signal for fuzzy matching)
        let chars: Vec<char> = normalized.chars().collect();
        if chars.len() >= 3 {
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let hash = Self::hash_string(&trigram);
                let idx = (hash as usize) % self.dimensions;
                let sign = if (hash >> 32) & 1 == 0 { 0.5 } else { -0.5 };
                embedding[idx] += sign;
            }
        }

        // L2-normalize so inner product is cosine similarity
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }

        embedding
    }
}

/// Inner product of two equal-length vectors.
#[must_use]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(DEFAULT_DIMENSIONS);
        assert_eq!(embedder.embed("hello world"), embedder.embed("hello world"));
    }

    #[test]
    fn test_dimensions() {
        let embedder = HashEmbedder::new(64);
        assert_eq!(embedder.embed("test").len(), 64);
    }

    #[test]
    fn test_normalized() {
        let embedder = HashEmbedder::new(DEFAULT_DIMENSIONS);
        let emb = embedder.embed("key encapsulation mechanism");
        let magnitude: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_overlapping_text_scores_higher() {
        let embedder = HashEmbedder::new(DEFAULT_DIMENSIONS);
        let base = embedder.embed("the quick brown fox");
        let similar = embedder.embed("the quick brown dog");
        let different = embedder.embed("completely unrelated content");

        assert!(inner_product(&base, &similar) > inner_product(&base, &different));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::new(DEFAULT_DIMENSIONS);
        let emb = embedder.embed("");
        assert!(emb.iter().all(|&x| x == 0.0));
    }
}
