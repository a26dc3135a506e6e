//! Error types for forumsearch-core.
//!
//! Search and storage errors live next to their modules
//! ([`SearchError`](crate::search::SearchError),
//! [`StoreError`](crate::storage::StoreError)); this module holds the errors
//! raised while preparing a corpus for indexing.

use thiserror::Error;

/// Errors that can occur while embedding text.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Transport-level failure talking to the provider
    #[error("Embedding request failed: {0}")]
    RequestFailed(String),
    /// Provider answered with a non-success status
    #[error("Embedding provider returned {status}: {body}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// Response body (best effort)
        body: String,
    },
    /// Provider response could not be interpreted
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),
    /// Returned vector has the wrong length
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension declared by the embedder
        expected: usize,
        /// Dimension actually returned
        actual: usize,
    },
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur while captioning an image.
#[derive(Debug, Clone, Error)]
pub enum CaptionError {
    /// Image could not be downloaded
    #[error("Failed to fetch image {url}: {reason}")]
    FetchFailed {
        /// Image URL
        url: String,
        /// Underlying failure
        reason: String,
    },
    /// Captioning model failed
    #[error("Captioning failed: {0}")]
    ModelFailed(String),
}

/// Errors that can occur during text chunking.
#[derive(Debug, Clone, Error)]
pub enum ChunkingError {
    /// Invalid chunking configuration
    #[error("Invalid chunking config: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur while loading a corpus snapshot.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Corpus file is missing
    #[error("Corpus file not found: {0}")]
    NotFound(String),
    /// Failed to read the corpus file
    #[error("Failed to read corpus: {0}")]
    Io(#[from] std::io::Error),
    /// Corpus JSON is malformed
    #[error("Failed to parse corpus: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::RequestFailed(err.to_string())
    }
}
