//! Tokenizer shared by the lexical index and the offline embedder.
//!
//! Text is lower-cased and split into maximal runs of ASCII letters or
//! maximal runs of ASCII digits. Everything else is a separator, so
//! `"Lab0: GitHub"` becomes `["lab", "0", "github"]`.

use bm25::Tokenizer;
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z]+|[0-9]+").expect("Invalid token regex pattern"));

/// Splits text into lower-case letter and digit tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// [`bm25::Tokenizer`] adapter around [`tokenize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PostTokenizer;

impl Tokenizer for PostTokenizer {
    fn tokenize(&self, input_text: &str) -> Vec<String> {
        tokenize(input_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_and_digits_split() {
        assert_eq!(tokenize("Lab0: GitHub"), vec!["lab", "0", "github"]);
        assert_eq!(tokenize("cs61b-sp24"), vec!["cs", "61", "b", "sp", "24"]);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(tokenize("GITHUB Account"), tokenize("github account"));
    }

    #[test]
    fn test_idempotent_on_joined_tokens() {
        let tokens = tokenize("How do I create a GitHub account? (lab 0)");
        assert_eq!(tokenize(&tokens.join(" ")), tokens);
    }

    #[test]
    fn test_punctuation_only_has_no_tokens() {
        assert!(tokenize("?!... --").is_empty());
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_non_ascii_is_separator() {
        assert_eq!(tokenize("café naïve"), vec!["caf", "na", "ve"]);
    }

    #[test]
    fn test_bm25_adapter_matches() {
        assert_eq!(
            Tokenizer::tokenize(&PostTokenizer, "Office Hours 3pm"),
            tokenize("Office Hours 3pm")
        );
    }
}
