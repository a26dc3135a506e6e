//! Index rebuild pipeline.
//!
//! Turns a corpus snapshot into a [`PersistedIndex`](crate::storage::PersistedIndex):
//!
//! 1. **Captions**: images of new or changed posts are captioned (optional)
//! 2. **Chunking**: cleaned post text is split with the configured policy
//! 3. **Reuse**: unchanged posts keep their stored chunks and embeddings
//! 4. **Embedding**: remaining chunks are embedded in batches
//!
//! The pipeline never touches a store; the service persists its output and
//! swaps snapshots.

mod pipeline;
mod progress;

pub use pipeline::{IndexingPipeline, RebuildReport};
pub use progress::EmbeddingProgress;
