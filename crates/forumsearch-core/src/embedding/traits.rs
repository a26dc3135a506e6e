//! Traits for embedding and captioning providers.
//!
//! The index and the query path only see these traits, so a hosted model, a
//! local model, or the offline [`HashingEmbedder`](super::HashingEmbedder)
//! can be swapped without touching retrieval code.

use crate::error::{CaptionError, EmbeddingError};
use async_trait::async_trait;

/// Turns text into fixed-length vectors.
///
/// Chunk embeddings and query embeddings must come from the same embedder.
/// `model_id` and `embedding_dim` are recorded in the index manifest; an
/// index built with another model is never queried with this one.
///
/// # Examples
///
/// ```
/// use forumsearch_core::embedding::{Embedder, HashingEmbedder};
///
/// let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// let embedder = HashingEmbedder::new(64);
/// let vectors = runtime
///     .block_on(embedder.embed_documents(&["GitHub account".to_string()]))
///     .unwrap();
/// assert_eq!(vectors[0].len(), embedder.embedding_dim());
/// ```
#[async_trait(?Send)]
pub trait Embedder {
    /// Identifier of the model (e.g. `"text-embedding-3-large"`).
    fn model_id(&self) -> &str;

    /// Returns the embedding dimension (vector size).
    ///
    /// All embeddings from this embedder have this length.
    fn embedding_dim(&self) -> usize;

    /// Embeds a batch of texts, one vector per input in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding for query".to_string()))
    }
}

/// Describes an image as text so it can be indexed with its post.
#[async_trait(?Send)]
pub trait Captioner {
    /// Returns a caption for the image at `image_url`.
    async fn caption(&self, image_url: &str) -> Result<String, CaptionError>;
}
