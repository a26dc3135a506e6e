//! Types for text chunking.

/// A chunk of text with metadata about its position in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Index of this chunk in the post (0-based)
    pub index: usize,
    /// The text content of this chunk
    pub text: String,
    /// Byte offset where this chunk starts in the source text
    pub start_char: usize,
    /// Byte offset where this chunk ends in the source text
    pub end_char: usize,
}
