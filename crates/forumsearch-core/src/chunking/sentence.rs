//! Sentence-based chunking.
//!
//! Text is split at sentence boundaries, then consecutive sentences are
//! grouped into windows. A window of one sentence with no overlap gives one
//! chunk per sentence.

use super::{ChunkingStrategy, TextChunk};
use crate::error::ChunkingError;
use once_cell::sync::Lazy;
use regex::Regex;

// Matches `. ! ?` runs followed by whitespace or end of text.
// Abbreviations like "e.g. this" over-split, which is fine for retrieval.
static SENTENCE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("Invalid sentence regex pattern"));

#[derive(Debug, Clone)]
struct Sentence {
    text: String,
    start_char: usize,
    end_char: usize,
}

/// Groups sentences into fixed-size windows.
///
/// # Examples
///
/// ```
/// use forumsearch_core::chunking::{ChunkingStrategy, SentenceWindowChunker};
///
/// let chunker = SentenceWindowChunker::new(2, 1).unwrap();
/// let chunks = chunker.chunk("One. Two. Three.").unwrap();
/// let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
/// assert_eq!(texts, vec!["One. Two.", "Two. Three."]);
/// ```
#[derive(Debug, Clone)]
pub struct SentenceWindowChunker {
    window: usize,
    overlap: usize,
}

impl SentenceWindowChunker {
    /// Creates a chunker emitting `window` sentences per chunk, sharing
    /// `overlap` sentences with the previous chunk.
    pub fn new(window: usize, overlap: usize) -> Result<Self, ChunkingError> {
        validate_window(window, overlap)?;
        Ok(Self { window, overlap })
    }

    /// One chunk per sentence.
    pub fn per_sentence() -> Self {
        Self {
            window: 1,
            overlap: 0,
        }
    }

    fn group_into_chunks(&self, sentences: &[Sentence]) -> Vec<TextChunk> {
        let step = self.window - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < sentences.len() {
            let end = (start + self.window).min(sentences.len());
            chunks.push(build_chunk(&sentences[start..end], chunks.len()));
            if end == sentences.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl ChunkingStrategy for SentenceWindowChunker {
    fn chunk(&self, text: &str) -> Result<Vec<TextChunk>, ChunkingError> {
        let sentences = split_sentences(text);
        Ok(self.group_into_chunks(&sentences))
    }

    fn name(&self) -> &'static str {
        if self.window == 1 {
            "sentence"
        } else {
            "sliding_window"
        }
    }
}

pub(crate) fn validate_window(window: usize, overlap: usize) -> Result<(), ChunkingError> {
    if window == 0 {
        return Err(ChunkingError::InvalidConfig(
            "window must be at least 1 sentence".to_string(),
        ));
    }
    if overlap >= window {
        return Err(ChunkingError::InvalidConfig(format!(
            "overlap ({overlap}) must be smaller than window ({window})"
        )));
    }
    Ok(())
}

fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut last_end = 0;

    for mat in SENTENCE_PATTERN.find_iter(text) {
        push_sentence(&mut sentences, text, last_end, mat.end());
        last_end = mat.end();
    }

    // Trailing text without terminal punctuation
    if last_end < text.len() {
        push_sentence(&mut sentences, text, last_end, text.len());
    }

    sentences
}

fn push_sentence(sentences: &mut Vec<Sentence>, text: &str, start: usize, end: usize) {
    let raw = &text[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let start_char = start + (raw.len() - raw.trim_start().len());
    sentences.push(Sentence {
        text: trimmed.to_string(),
        start_char,
        end_char: start_char + trimmed.len(),
    });
}

fn build_chunk(sentences: &[Sentence], index: usize) -> TextChunk {
    let text = sentences
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    TextChunk {
        index,
        text,
        start_char: sentences.first().map(|s| s.start_char).unwrap_or(0),
        end_char: sentences.last().map(|s| s.end_char).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[TextChunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_one_chunk_per_sentence() {
        let chunker = SentenceWindowChunker::per_sentence();
        let chunks = chunker
            .chunk("How do I set up GitHub? I tried twice!  It fails...")
            .unwrap();

        assert_eq!(
            texts(&chunks),
            vec!["How do I set up GitHub?", "I tried twice!", "It fails..."]
        );
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_offsets_point_into_source() {
        let text = "  First one. Second one";
        let chunks = SentenceWindowChunker::per_sentence().chunk(text).unwrap();
        for chunk in &chunks {
            assert_eq!(&text[chunk.start_char..chunk.end_char], chunk.text);
        }
    }

    #[test]
    fn test_no_terminal_punctuation_is_one_sentence() {
        let chunks = SentenceWindowChunker::per_sentence()
            .chunk("lab 0 github account")
            .unwrap();
        assert_eq!(texts(&chunks), vec!["lab 0 github account"]);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = SentenceWindowChunker::per_sentence();
        assert!(chunker.chunk("").unwrap().is_empty());
        assert!(chunker.chunk("   ").unwrap().is_empty());
    }

    #[test]
    fn test_window_two_overlap_one() {
        let chunker = SentenceWindowChunker::new(2, 1).unwrap();
        let chunks = chunker.chunk("A. B. C. D.").unwrap();
        assert_eq!(texts(&chunks), vec!["A. B.", "B. C.", "C. D."]);
    }

    #[test]
    fn test_window_three_overlap_two() {
        let chunker = SentenceWindowChunker::new(3, 2).unwrap();
        let chunks = chunker.chunk("A. B. C. D.").unwrap();
        assert_eq!(texts(&chunks), vec!["A. B. C.", "B. C. D."]);
    }

    #[test]
    fn test_window_larger_than_text() {
        let chunker = SentenceWindowChunker::new(5, 1).unwrap();
        let chunks = chunker.chunk("A. B.").unwrap();
        assert_eq!(texts(&chunks), vec!["A. B."]);
    }

    #[test]
    fn test_window_without_overlap_tiles_text() {
        let chunker = SentenceWindowChunker::new(2, 0).unwrap();
        let chunks = chunker.chunk("A. B. C.").unwrap();
        assert_eq!(texts(&chunks), vec!["A. B.", "C."]);
    }

    #[test]
    fn test_invalid_windows_rejected() {
        assert!(SentenceWindowChunker::new(0, 0).is_err());
        assert!(SentenceWindowChunker::new(2, 2).is_err());
        assert!(SentenceWindowChunker::new(2, 3).is_err());
    }
}
