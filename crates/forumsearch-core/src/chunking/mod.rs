//! Text chunking strategies.
//!
//! Post text is split into chunks before embedding so that a query can match
//! the one passage of a long thread that answers it. The vector index holds
//! one embedding per chunk.
//!
//! # Policies
//!
//! - [`ChunkingPolicy::WholePost`]: one chunk per post
//! - [`ChunkingPolicy::Sentence`]: one chunk per sentence (default)
//! - [`ChunkingPolicy::SlidingWindow`]: `window` sentences per chunk, with
//!   `overlap` sentences shared between neighbours

mod sentence;
mod types;
mod whole;

use crate::error::ChunkingError;
use serde::{Deserialize, Serialize};

pub use sentence::SentenceWindowChunker;
pub use types::TextChunk;
pub use whole::WholePostChunker;

/// Trait for text chunking strategies.
pub trait ChunkingStrategy: Send + Sync {
    /// Splits text into chunks.
    ///
    /// Chunks are ordered by position (ascending `start_char`) and carry a
    /// dense 0-based `index`. Empty or blank text yields no chunks.
    fn chunk(&self, text: &str) -> Result<Vec<TextChunk>, ChunkingError>;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &'static str;
}

/// How post text is split before embedding.
///
/// Recorded in the index manifest; a policy change forces a full re-embed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkingPolicy {
    /// The whole post is one chunk
    WholePost,
    /// Every sentence is a chunk
    #[default]
    Sentence,
    /// Groups of `window` sentences advancing by `window - overlap`
    SlidingWindow {
        /// Sentences per chunk
        window: usize,
        /// Sentences shared with the previous chunk
        overlap: usize,
    },
}

impl ChunkingPolicy {
    /// Checks the window parameters.
    pub fn validate(&self) -> Result<(), ChunkingError> {
        match *self {
            ChunkingPolicy::SlidingWindow { window, overlap } => {
                sentence::validate_window(window, overlap)
            }
            ChunkingPolicy::WholePost | ChunkingPolicy::Sentence => Ok(()),
        }
    }
}

/// Creates the chunker for a policy.
pub fn create_chunker(policy: ChunkingPolicy) -> Result<Box<dyn ChunkingStrategy>, ChunkingError> {
    Ok(match policy {
        ChunkingPolicy::WholePost => Box::new(WholePostChunker),
        ChunkingPolicy::Sentence => Box::new(SentenceWindowChunker::per_sentence()),
        ChunkingPolicy::SlidingWindow { window, overlap } => {
            Box::new(SentenceWindowChunker::new(window, overlap)?)
        }
    })
}
