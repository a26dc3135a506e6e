//! Offline feature-hashing embedder.
//!
//! Produces deterministic dense vectors by hashing tokens into fixed-dimension
//! buckets weighted by term frequency. Far weaker than a neural model, but it
//! needs no network and no API key, which makes it the embedder for
//! `--offline` runs and tests.

use super::traits::Embedder;
use crate::error::EmbeddingError;
use crate::search::tokenize;
use async_trait::async_trait;
use std::collections::HashMap;

/// Default dimension of [`HashingEmbedder::default`].
pub const DEFAULT_HASHING_DIM: usize = 256;

/// Feature-hashing embedder over the search tokenizer's tokens.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    /// Creates an embedder producing `dimension`-length vectors.
    ///
    /// A zero dimension is bumped to 1.
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("hashing-v1-{dimension}"),
        }
    }

    /// Hash a token into a bucket index using FNV-1a.
    fn bucket(token: &str, dimension: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in token.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % dimension as u64) as usize
    }

    /// Embeds one text; blank or token-free text gives the zero vector.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vector;
        }

        let mut tf: HashMap<&str, f32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.as_str()).or_default() += 1.0;
        }
        for (token, count) in tf {
            vector[Self::bucket(token, self.dimension)] += count;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIM)
    }
}

#[async_trait(?Send)]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embedding_dim(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
