//! Persistence of index snapshots.
//!
//! A snapshot is written and read as one [`PersistedIndex`]: the manifest,
//! the corpus it was built from, the chunk table, and one embedding per
//! chunk. Both in-memory indexes are rebuilt from it on load, so the lexical
//! and vector sides always describe the same corpus.
//!
//! # Implementations
//!
//! - [`InMemoryIndexStore`] - volatile store for tests and one-shot runs
//! - [`RedbIndexStore`] - redb database file (feature `redb-store`, on by default)

mod memory;

#[cfg(feature = "redb-store")]
mod redb_store;

pub use memory::InMemoryIndexStore;

#[cfg(feature = "redb-store")]
pub use redb_store::RedbIndexStore;

use crate::corpus::Corpus;
use crate::search::{ChunkRecord, IndexManifest};
use thiserror::Error;

/// Errors that can occur during index store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Stored data does not form a valid snapshot
    #[error("Corrupt index: {0}")]
    Corrupt(String),
}

/// Everything needed to restore one index snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedIndex {
    /// Snapshot description
    pub manifest: IndexManifest,
    /// Corpus the snapshot was built from, captions included
    pub corpus: Corpus,
    /// Chunk table; position is the chunk id
    pub chunks: Vec<ChunkRecord>,
    /// One embedding per chunk, same order as `chunks`
    pub embeddings: Vec<Vec<f32>>,
}

impl PersistedIndex {
    /// Checks the one-embedding-per-chunk invariant and the manifest counts.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.chunks.len() != self.embeddings.len() {
            return Err(StoreError::Corrupt(format!(
                "{} chunks but {} embeddings",
                self.chunks.len(),
                self.embeddings.len()
            )));
        }
        if self.manifest.chunk_count != self.chunks.len() {
            return Err(StoreError::Corrupt(format!(
                "manifest lists {} chunks, found {}",
                self.manifest.chunk_count,
                self.chunks.len()
            )));
        }
        if let Some(bad) = self
            .embeddings
            .iter()
            .find(|e| e.len() != self.manifest.embedding_dim)
        {
            return Err(StoreError::Corrupt(format!(
                "embedding of length {} in a {}-dimensional index",
                bad.len(),
                self.manifest.embedding_dim
            )));
        }
        Ok(())
    }
}

/// Storage for the current snapshot of one corpus.
///
/// `replace_index` is all-or-nothing: readers see either the previous
/// snapshot or the new one, never a mix.
#[async_trait::async_trait(?Send)]
pub trait IndexStore {
    /// Loads the stored snapshot, `Ok(None)` if nothing was stored yet.
    async fn load_index(&self) -> Result<Option<PersistedIndex>, StoreError>;

    /// Loads only the manifest.
    async fn load_manifest(&self) -> Result<Option<IndexManifest>, StoreError>;

    /// Atomically replaces the stored snapshot.
    async fn replace_index(&self, index: &PersistedIndex) -> Result<(), StoreError>;

    /// Number of stored chunks.
    async fn chunk_count(&self) -> Result<usize, StoreError>;

    /// Removes the stored snapshot.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::chunking::ChunkingPolicy;
    use crate::corpus::{Post, PostId};
    use crate::search::CURRENT_SCHEMA_VERSION;

    /// Two posts, three chunks, 3-dimensional embeddings.
    pub(crate) fn sample_index() -> PersistedIndex {
        let mut corpus = Corpus::new();
        corpus.insert("1", Post::new("Lab 0", "GitHub account. Sign up."));
        corpus.insert("2", Post::new("Midterm", "Exam scope"));
        let hash_1 = corpus
            .get(&PostId::from("1"))
            .map(Post::content_hash)
            .unwrap_or_default();
        let hash_2 = corpus
            .get(&PostId::from("2"))
            .map(Post::content_hash)
            .unwrap_or_default();

        let chunk = |post: &str, subject: &str, index: usize, text: &str, hash: &str| ChunkRecord {
            post_id: PostId::from(post),
            subject: subject.to_string(),
            chunk_index: index,
            text: text.to_string(),
            post_hash: hash.to_string(),
        };

        PersistedIndex {
            manifest: IndexManifest {
                schema_version: CURRENT_SCHEMA_VERSION,
                corpus_hash: corpus.content_hash(),
                embedding_model: "test-model".to_string(),
                embedding_dim: 3,
                chunking: ChunkingPolicy::Sentence,
                post_count: 2,
                chunk_count: 3,
                built_at: 1_700_000_000,
            },
            chunks: vec![
                chunk("1", "Lab 0", 0, "Lab 0 GitHub account.", &hash_1),
                chunk("1", "Lab 0", 1, "Sign up.", &hash_1),
                chunk("2", "Midterm", 0, "Midterm Exam scope", &hash_2),
            ],
            embeddings: vec![
                vec![1.0, 0.0, 0.0],
                vec![0.5, 0.5, 0.0],
                vec![-0.25, 0.0, 1.5],
            ],
            corpus,
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample_index().validate().is_ok());
    }

    #[test]
    fn test_validate_detects_missing_embedding() {
        let mut index = sample_index();
        index.embeddings.pop();
        assert!(matches!(index.validate(), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_validate_detects_wrong_dimension() {
        let mut index = sample_index();
        index.embeddings[1] = vec![1.0];
        assert!(index.validate().is_err());
    }
}
