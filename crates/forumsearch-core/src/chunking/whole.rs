//! One chunk per post.

use super::{ChunkingStrategy, TextChunk};
use crate::error::ChunkingError;

/// Emits the whole (trimmed) text as a single chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholePostChunker;

impl ChunkingStrategy for WholePostChunker {
    fn chunk(&self, text: &str) -> Result<Vec<TextChunk>, ChunkingError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(vec![]);
        }
        let start_char = text.len() - text.trim_start().len();
        Ok(vec![TextChunk {
            index: 0,
            text: trimmed.to_string(),
            start_char,
            end_char: start_char + trimmed.len(),
        }])
    }

    fn name(&self) -> &'static str {
        "whole_post"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk() {
        let chunks = WholePostChunker.chunk("  One. Two.  ").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "One. Two.");
        assert_eq!(chunks[0].start_char, 2);
        assert_eq!(chunks[0].end_char, 11);
    }

    #[test]
    fn test_blank_text() {
        assert!(WholePostChunker.chunk(" \n ").unwrap().is_empty());
    }
}
