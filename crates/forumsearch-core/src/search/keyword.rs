//! BM25 lexical candidate filter.
//!
//! Wraps the [`bm25`](https://crates.io/crates/bm25) crate with the
//! [`PostTokenizer`] so that the corpus and queries are tokenized the same
//! way. One BM25 document per post, built from
//! [`Post::lexical_text`](crate::corpus::Post::lexical_text).
//!
//! Scoring uses the crate defaults (k1 = 1.2, b = 0.75). Every post is
//! ranked: posts sharing no token with the query score 0 and fill the tail
//! of the ranking, so a misspelled query still yields candidates.

use super::tokenizer::{tokenize, PostTokenizer};
use crate::corpus::{Corpus, PostId};
use bm25::{Document, SearchEngine, SearchEngineBuilder};
use tracing::{debug, instrument};

/// Read-only BM25 index over the posts of one corpus snapshot.
pub struct LexicalIndex {
    /// `None` for an empty corpus
    search_engine: Option<SearchEngine<u64, u32, PostTokenizer>>,
    /// BM25 document id → post id
    post_ids: Vec<PostId>,
}

impl LexicalIndex {
    /// Builds the index over every post of the corpus.
    #[instrument(skip_all, fields(posts = corpus.len()))]
    pub fn build(corpus: &Corpus) -> Self {
        let mut post_ids = Vec::with_capacity(corpus.len());
        let mut documents = Vec::with_capacity(corpus.len());

        for (id, post) in corpus.iter() {
            documents.push(Document {
                id: post_ids.len() as u64,
                contents: post.lexical_text(),
            });
            post_ids.push(id.clone());
        }

        let search_engine = if documents.is_empty() {
            None
        } else {
            Some(
                SearchEngineBuilder::<u64, u32, PostTokenizer>::with_tokenizer_and_documents(
                    PostTokenizer,
                    documents,
                )
                .build(),
            )
        };

        debug!("Built lexical index over {} posts", post_ids.len());
        Self {
            search_engine,
            post_ids,
        }
    }

    /// Returns the `n` best-scoring posts for the query.
    ///
    /// Sorted by BM25 score descending, ties by post id ascending. Posts
    /// without a query token score 0.0 and still fill the ranking up to `n`.
    /// Empty when the corpus is empty, the query has no tokens, or `n == 0`.
    pub fn top_n(&self, query: &str, n: usize) -> Vec<(PostId, f32)> {
        let Some(engine) = &self.search_engine else {
            return Vec::new();
        };
        if n == 0 || tokenize(query).is_empty() {
            return Vec::new();
        }

        // The engine only returns posts matching a token; the rest stay at 0.
        let mut scores = vec![0.0f32; self.post_ids.len()];
        for result in engine.search(query, self.post_ids.len()) {
            if let Some(score) = scores.get_mut(result.document.id as usize) {
                *score = result.score;
            }
        }

        let mut results: Vec<(PostId, f32)> =
            self.post_ids.iter().cloned().zip(scores).collect();
        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results.truncate(n);
        results
    }

    /// Returns the number of indexed posts.
    pub fn len(&self) -> usize {
        self.post_ids.len()
    }

    /// Returns `true` if no posts have been indexed.
    pub fn is_empty(&self) -> bool {
        self.post_ids.is_empty()
    }
}
