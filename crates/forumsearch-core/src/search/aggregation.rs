//! Post-level aggregation of chunk similarities.
//!
//! A post is represented by several chunks in the vector index; this module
//! collapses their similarities into one score per post.

use crate::corpus::PostId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How chunk similarities collapse into a post score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Best chunk wins
    #[default]
    Max,
    /// Similarities of all retrieved chunks are added
    Sum,
}

/// Groups `(post, similarity)` pairs by post and aggregates them.
///
/// Returns one entry per post, sorted by score descending with ties broken
/// by post id ascending.
///
/// # Examples
///
/// ```
/// use forumsearch_core::corpus::PostId;
/// use forumsearch_core::search::{aggregate_chunk_hits, AggregationPolicy};
///
/// let hits = vec![
///     (PostId::from("1"), 0.9),
///     (PostId::from("1"), 0.7),
///     (PostId::from("2"), 0.8),
/// ];
/// let posts = aggregate_chunk_hits(hits, AggregationPolicy::Max);
/// assert_eq!(posts[0], (PostId::from("1"), 0.9));
/// assert_eq!(posts[1], (PostId::from("2"), 0.8));
/// ```
pub fn aggregate_chunk_hits<I>(hits: I, policy: AggregationPolicy) -> Vec<(PostId, f32)>
where
    I: IntoIterator<Item = (PostId, f32)>,
{
    let mut post_scores: HashMap<PostId, f32> = HashMap::new();

    for (post_id, similarity) in hits {
        post_scores
            .entry(post_id)
            .and_modify(|score| match policy {
                AggregationPolicy::Max => *score = score.max(similarity),
                AggregationPolicy::Sum => *score += similarity,
            })
            .or_insert(similarity);
    }

    let mut posts: Vec<(PostId, f32)> = post_scores.into_iter().collect();
    posts.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    posts
}
