//! Embedding and relevance-scoring ports.
//!
//! The pipeline never talks to a model directly; it consumes these traits.
//! Production deployments wire in a real sentence-embedding backend and a
//! cross-encoder service. [`HashEmbedder`] is the deterministic hash-based
//! stand-in used by the CLI and the test suite.

use crate::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Produces dense vector embeddings for item texts.
pub trait Embedder: Send + Sync {
    /// Embedding dimensionality.
    fn dimensions(&self) -> usize;

    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds a batch of texts, in order.
    ///
    /// # Errors
    ///
    /// Returns the first per-text error.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Scores candidate texts against a query with a named cross-encoder model.
pub trait RelevanceScorer: Send + Sync {
    /// Returns one relevance score per candidate, positionally.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend fails.
    fn score(&self, model: &str, query: &str, candidates: &[String]) -> Result<Vec<f32>>;
}

/// Deterministic hash-based pseudo-embedder.
///
/// Distributes per-word hash values across the vector and normalizes the
/// result. Identical texts map to identical unit vectors, which is enough
/// for exercising the pipeline, but the space carries no real semantics.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Bounds per-text work on pathological inputs.
    const MAX_WORDS: usize = 1000;

    /// Creates an embedder with the given dimensionality (minimum 8).
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(8),
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn distribute_hash(embedding: &mut [f32], hash: u64, word_idx: usize, dimensions: usize) {
        for j in 0..8 {
            let idx = ((hash >> (j * 8)) as usize + word_idx) % dimensions;
            let value = ((hash >> (j * 4)) & 0xFF) as f32 / 255.0 - 0.5;
            embedding[idx] += value;
        }
    }

    fn normalize(embedding: &mut [f32]) {
        let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
        if norm_sq <= 0.0 {
            return;
        }
        let inv_norm = norm_sq.sqrt().recip();
        for v in embedding.iter_mut() {
            *v *= inv_norm;
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimensions];
        for (i, word) in text.split_whitespace().take(Self::MAX_WORDS).enumerate() {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            Self::distribute_hash(&mut embedding, hasher.finish(), i, self.dimensions);
        }
        Self::normalize(&mut embedding);
        Ok(embedding)
    }
}
