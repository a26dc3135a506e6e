// Reciprocal Rank Fusion (RRF) and strategy selection

use crate::corpus::PostId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// How the lexical and semantic rankings are combined.
///
/// The two strategies are not equivalent: only `ReciprocalRank` can return a
/// post that is missing from the lexical candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Keep only chunks of lexical candidates, then aggregate per post
    #[default]
    Intersection,
    /// Sum reciprocal ranks over the union of both rankings
    ReciprocalRank,
}

/// Combines two post rankings with RRF.
///
/// RRF Formula: `score(p) = 1/(k + rank_lex(p)) + 1/(k + rank_sem(p))`
///
/// Ranks are 1-indexed. A post missing from one ranking gets that ranking's
/// length + 1 there, so every post of the union is kept. Output is sorted
/// by score descending, ties by post id ascending.
pub fn reciprocal_rank_fusion(
    lexical: &[PostId],
    semantic: &[PostId],
    k: usize,
) -> Vec<(PostId, f32)> {
    let lexical_ranks = rank_positions(lexical);
    let semantic_ranks = rank_positions(semantic);
    let lexical_absent = lexical_ranks.len() + 1;
    let semantic_absent = semantic_ranks.len() + 1;
    let k_param = k as f32;

    let candidates: BTreeSet<&PostId> = lexical.iter().chain(semantic.iter()).collect();

    let mut fused: Vec<(PostId, f32)> = candidates
        .into_iter()
        .map(|post_id| {
            let lexical_rank = lexical_ranks.get(post_id).copied().unwrap_or(lexical_absent);
            let semantic_rank = semantic_ranks
                .get(post_id)
                .copied()
                .unwrap_or(semantic_absent);
            let score = 1.0 / (k_param + lexical_rank as f32)
                + 1.0 / (k_param + semantic_rank as f32);
            (post_id.clone(), score)
        })
        .collect();

    fused.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    fused
}

/// 1-indexed rank of each post; the first occurrence wins on duplicates.
fn rank_positions(ranking: &[PostId]) -> HashMap<&PostId, usize> {
    let mut ranks = HashMap::with_capacity(ranking.len());
    for post_id in ranking {
        let next = ranks.len() + 1;
        ranks.entry(post_id).or_insert(next);
    }
    ranks
}
