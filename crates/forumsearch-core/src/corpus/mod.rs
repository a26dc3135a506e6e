//! Corpus model: forum posts keyed by post id.
//!
//! The scraper writes one JSON object per course mapping post ids to post
//! records. A [`Corpus`] is an immutable snapshot of that file; both derived
//! indexes are built from it and its [`content hash`](Corpus::content_hash)
//! decides whether a rebuild is needed.

use crate::error::CorpusError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Stable identifier of a forum thread (numeric-looking string, e.g. `"42"`).
///
/// Ordering is plain string ordering; every ranking tie-break uses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Creates a post id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One forum thread as captured by the scraper.
///
/// Content fields are plain text (HTML already stripped). `captions` is
/// order-aligned with `image_urls` and may be filled in during a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Thread title
    #[serde(default)]
    pub subject: String,
    /// Body of the initial question
    #[serde(default)]
    pub content: String,
    /// First instructor answer, if any
    #[serde(default)]
    pub instructor_answer: Option<String>,
    /// First student answer endorsed by an instructor, if any
    #[serde(default)]
    pub endorsed_answer: Option<String>,
    /// Image links found in the question body
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Generated image descriptions
    #[serde(default)]
    pub captions: Vec<String>,
}

impl Post {
    /// Creates a post with only subject and content set.
    pub fn new(subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Text covered by the lexical index: subject, content, instructor
    /// answer, endorsed answer.
    pub fn lexical_text(&self) -> String {
        join_parts(self.text_parts())
    }

    /// Text that gets chunked and embedded: [`lexical_text`](Self::lexical_text)
    /// followed by every caption.
    pub fn full_text(&self) -> String {
        join_parts(
            self.text_parts()
                .chain(self.captions.iter().map(String::as_str)),
        )
    }

    /// SHA-256 of the post's canonical JSON, used to spot changed posts.
    pub fn content_hash(&self) -> String {
        // Serializing a plain struct of strings cannot fail.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex_digest(&bytes)
    }

    fn text_parts(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.subject.as_str()),
            Some(self.content.as_str()),
            self.instructor_answer.as_deref(),
            self.endorsed_answer.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

fn join_parts<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Snapshot of every post of one course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    posts: BTreeMap<PostId, Post>,
}

impl Corpus {
    /// Creates an empty corpus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses the scraper's JSON object (`post_id → post`).
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, CorpusError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Loads a corpus file from disk.
    ///
    /// A missing file is reported as [`CorpusError::NotFound`] so callers can
    /// tell "nothing scraped yet" apart from a corrupt file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CorpusError::NotFound(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        Self::from_json_slice(&bytes)
    }

    /// Inserts or replaces a post.
    pub fn insert(&mut self, id: impl Into<PostId>, post: Post) {
        self.posts.insert(id.into(), post);
    }

    /// Looks up a post.
    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.get(id)
    }

    /// Iterates posts in ascending post id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PostId, &Post)> {
        self.posts.iter()
    }

    /// Number of posts.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Returns `true` if the corpus has no posts.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// SHA-256 hex digest of the canonical serialization.
    ///
    /// Independent of the key order of the source file.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(&self.posts).unwrap_or_default();
        hex_digest(&bytes)
    }
}

impl FromIterator<(PostId, Post)> for Corpus {
    fn from_iter<I: IntoIterator<Item = (PostId, Post)>>(iter: I) -> Self {
        Self {
            posts: iter.into_iter().collect(),
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[.*?\]\(.*?\)").expect("Invalid markdown image pattern"));
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("Invalid markdown link pattern"));

/// Strips markdown noise before chunking.
///
/// Image embeds are dropped, links keep only their label, backticks go.
pub fn clean_text(text: &str) -> String {
    let text = MARKDOWN_IMAGE.replace_all(text, "");
    let text = MARKDOWN_LINK.replace_all(&text, "$1");
    text.replace('`', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_text_order_and_skipping() {
        let post = Post {
            subject: "  Lab 0 setup ".to_string(),
            content: "How do I create a GitHub account?".to_string(),
            instructor_answer: Some("Use your school email.".to_string()),
            endorsed_answer: Some("   ".to_string()),
            image_urls: vec!["https://img/1".to_string()],
            captions: vec!["A screenshot of the signup page".to_string()],
        };

        assert_eq!(
            post.full_text(),
            "Lab 0 setup How do I create a GitHub account? Use your school email. \
             A screenshot of the signup page"
        );
        assert_eq!(
            post.lexical_text(),
            "Lab 0 setup How do I create a GitHub account? Use your school email."
        );
    }

    #[test]
    fn test_empty_post_has_empty_text() {
        let post = Post::default();
        assert_eq!(post.full_text(), "");
        assert_eq!(post.lexical_text(), "");
    }

    #[test]
    fn test_corpus_parses_scraper_json() {
        let json = br#"{
            "12": {"subject": "Midterm", "content": "What is the exam scope?",
                   "instructor_answer": null, "full_text": "ignored"},
            "3": {"subject": "Lab 0", "content": "GitHub", "image_urls": ["u"]}
        }"#;
        let corpus = Corpus::from_json_slice(json).unwrap();

        assert_eq!(corpus.len(), 2);
        let ids: Vec<&str> = corpus.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["12", "3"]);
        let lab = corpus.get(&PostId::from("3")).unwrap();
        assert_eq!(lab.image_urls, vec!["u".to_string()]);
        assert!(lab.captions.is_empty());
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a = Corpus::from_json_slice(
            br#"{"1": {"subject": "a", "content": "x"}, "2": {"subject": "b", "content": "y"}}"#,
        )
        .unwrap();
        let b = Corpus::from_json_slice(
            br#"{"2": {"subject": "b", "content": "y"}, "1": {"subject": "a", "content": "x"}}"#,
        )
        .unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let mut corpus = Corpus::new();
        corpus.insert("1", Post::new("a", "x"));
        let before = corpus.content_hash();
        corpus.insert("1", Post::new("a", "x!"));
        assert_ne!(before, corpus.content_hash());
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let result = Corpus::load("/nonexistent/posts.json");
        assert!(matches!(result, Err(CorpusError::NotFound(_))));
    }

    #[test]
    fn test_clean_text() {
        let cleaned =
            clean_text("See ![diagram](http://x/y.png) the [docs](http://d) for `git init`");
        assert_eq!(cleaned, "See  the docs for git init");
    }
}
