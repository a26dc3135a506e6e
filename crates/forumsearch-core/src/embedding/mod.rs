//! Embedding providers.
//!
//! - [`OpenAiEmbedder`] - hosted OpenAI-compatible `/embeddings` endpoint
//! - [`HashingEmbedder`] - deterministic offline feature hashing
//!
//! Captioning is only a seam ([`Captioner`]); no vision client ships here.

mod hashing;
mod openai;
mod traits;

pub use hashing::{HashingEmbedder, DEFAULT_HASHING_DIM};
pub use openai::{
    known_model_dimension, OpenAiConfig, OpenAiEmbedder, DEFAULT_OPENAI_BASE_URL,
    DEFAULT_OPENAI_MODEL,
};
pub use traits::{Captioner, Embedder};
