use crate::chunking::ChunkingPolicy;
use crate::corpus::PostId;
use crate::error::{ChunkingError, EmbeddingError};
use crate::storage::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returns the current Unix timestamp (seconds since UNIX_EPOCH).
///
/// If the system time is before UNIX_EPOCH, returns 0 instead of panicking.
pub fn get_current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Identifier of a chunk within one index snapshot.
///
/// Dense and assigned in order during a rebuild; not stable across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(u64);

impl ChunkId {
    /// Creates a ChunkId from a raw u64 value.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value of this ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// A chunk of post text together with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Post the chunk belongs to
    pub post_id: PostId,
    /// Subject of that post
    pub subject: String,
    /// Position of the chunk within the post (0-based)
    pub chunk_index: usize,
    /// Chunk text as embedded
    pub text: String,
    /// Content hash of the post when the chunk was embedded
    pub post_hash: String,
}

/// One nearest-neighbour match from the vector index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkHit {
    /// Matched chunk
    pub chunk_id: ChunkId,
    /// Cosine similarity in `[-1, 1]`
    pub similarity: f32,
}

/// A ranked post returned from a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostHit {
    /// Post identifier
    pub post_id: PostId,
    /// Post subject
    pub subject: String,
    /// Relevance score, higher is better
    pub score: f32,
}

/// Errors that can occur during search and index maintenance.
#[derive(Debug, Error)]
pub enum SearchError {
    /// No ready index for the corpus
    #[error("No index available for corpus '{corpus_id}'")]
    NotFound {
        /// Corpus that was queried
        corpus_id: String,
    },
    /// Embedding the query or chunks failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    /// Vector dimension mismatch (expected vs actual)
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension
        expected: usize,
        /// Actual embedding dimension received
        actual: usize,
    },
    /// Index construction or query error
    #[error("Index error: {0}")]
    Index(String),
    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    /// Another rebuild of the same corpus is running
    #[error("A rebuild of corpus '{corpus_id}' is already in progress")]
    RebuildInProgress {
        /// Corpus being rebuilt
        corpus_id: String,
    },
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ChunkingError> for SearchError {
    fn from(err: ChunkingError) -> Self {
        SearchError::InvalidConfig(err.to_string())
    }
}

/// Validates that an embedding has the expected dimension.
///
/// # Examples
///
/// ```
/// use forumsearch_core::search::validate_dimension;
///
/// assert!(validate_dimension(3, 3).is_ok());
/// assert!(validate_dimension(5, 3).is_err());
/// ```
pub fn validate_dimension(expected: usize, actual: usize) -> Result<(), SearchError> {
    if actual == expected {
        Ok(())
    } else {
        Err(SearchError::DimensionMismatch { expected, actual })
    }
}

// ============================================================================
// Persistence Types
// ============================================================================

/// Current schema version for the persisted index.
///
/// - v1: manifest + corpus snapshot in `meta`, chunk records, LE f32 embeddings
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Describes one index snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Schema version the snapshot was written with
    pub schema_version: u32,
    /// Content hash of the corpus the snapshot was built from
    pub corpus_hash: String,
    /// Model identifier of the embedder
    pub embedding_model: String,
    /// Embedding dimension
    pub embedding_dim: usize,
    /// Chunking policy used to split posts
    pub chunking: ChunkingPolicy,
    /// Number of posts indexed
    pub post_count: usize,
    /// Number of chunks embedded
    pub chunk_count: usize,
    /// Unix timestamp of the build
    pub built_at: u64,
}

impl IndexManifest {
    /// Checks if this snapshot can be read by the current version.
    pub fn is_compatible(&self) -> bool {
        self.schema_version == CURRENT_SCHEMA_VERSION
    }

    /// Returns `true` if stored embeddings can be reused with the given
    /// embedder and chunking policy.
    pub fn embeddings_reusable(
        &self,
        model_id: &str,
        dimension: usize,
        chunking: &ChunkingPolicy,
    ) -> bool {
        self.is_compatible()
            && self.embedding_model == model_id
            && self.embedding_dim == dimension
            && &self.chunking == chunking
    }
}
