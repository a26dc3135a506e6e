//! Query execution over one immutable index snapshot.
//!
//! An [`IndexSnapshot`] pairs the lexical and vector indexes built from the
//! same [`PersistedIndex`]. The service swaps whole snapshots; a query holds
//! an `Arc` to the one it started with.
//!
//! Per query:
//! 1. Lexical candidates: BM25 top-N posts
//! 2. Semantic hits: top-M nearest chunks with similarity `1 - d`
//! 3. Strategy:
//!    - `Intersection`: drop chunks of non-candidates, aggregate per post
//!    - `ReciprocalRank`: fuse the lexical and max-aggregated semantic rankings
//! 4. Take K, attach subjects

use super::aggregation::{aggregate_chunk_hits, AggregationPolicy};
use super::fusion::{reciprocal_rank_fusion, FusionStrategy};
use super::keyword::LexicalIndex;
use super::types::{ChunkId, ChunkRecord, IndexManifest, PostHit, SearchError};
use super::vector::VectorIndex;
use crate::config::RetrievalConfig;
use crate::corpus::{Corpus, PostId};
use crate::storage::PersistedIndex;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Read-only lexical + vector index pair for one corpus hash.
pub struct IndexSnapshot {
    manifest: IndexManifest,
    corpus: Corpus,
    chunks: Vec<ChunkRecord>,
    lexical: LexicalIndex,
    vector: VectorIndex,
}

impl IndexSnapshot {
    /// Rebuilds both in-memory indexes from a persisted snapshot.
    ///
    /// # Errors
    ///
    /// `SearchError::Storage` if the snapshot breaks the one-embedding-per-chunk
    /// invariant, `SearchError::DimensionMismatch` if an embedding disagrees
    /// with the manifest.
    #[instrument(skip_all, fields(chunks = persisted.chunks.len()))]
    pub fn from_persisted(persisted: PersistedIndex) -> Result<Self, SearchError> {
        persisted.validate()?;
        let PersistedIndex {
            manifest,
            corpus,
            chunks,
            embeddings,
        } = persisted;

        let vector = VectorIndex::build(
            manifest.embedding_dim,
            embeddings
                .into_iter()
                .enumerate()
                .map(|(i, embedding)| (ChunkId::from_u64(i as u64), embedding)),
        )?;
        let lexical = LexicalIndex::build(&corpus);

        debug!(
            "Snapshot ready: {} posts, {} chunks",
            lexical.len(),
            vector.len()
        );
        Ok(Self {
            manifest,
            corpus,
            chunks,
            lexical,
            vector,
        })
    }

    /// Ranks posts for a query.
    ///
    /// `query_embedding` must come from the embedder recorded in the
    /// manifest. Returns at most `k` hits, strictly ordered by score
    /// descending then post id ascending.
    #[instrument(skip_all, fields(k = k))]
    pub fn search(
        &self,
        query: &str,
        query_embedding: &[f32],
        config: &RetrievalConfig,
        k: usize,
    ) -> Result<Vec<PostHit>, SearchError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let lexical = self.lexical.top_n(query, config.lexical_top_n);
        let chunk_hits = self.vector.search(query_embedding, config.semantic_top_m)?;
        debug!(
            "{} lexical candidates, {} semantic chunk hits",
            lexical.len(),
            chunk_hits.len()
        );

        let ranked = match config.strategy {
            FusionStrategy::Intersection => {
                if lexical.is_empty() {
                    return Ok(Vec::new());
                }
                let candidates: HashSet<&PostId> = lexical.iter().map(|(id, _)| id).collect();
                let hits = chunk_hits.iter().filter_map(|hit| {
                    let chunk = self.chunk(hit.chunk_id)?;
                    candidates
                        .contains(&chunk.post_id)
                        .then(|| (chunk.post_id.clone(), hit.similarity))
                });
                aggregate_chunk_hits(hits, config.aggregation)
            }
            FusionStrategy::ReciprocalRank => {
                let semantic: Vec<PostId> = aggregate_chunk_hits(
                    chunk_hits.iter().filter_map(|hit| {
                        self.chunk(hit.chunk_id)
                            .map(|chunk| (chunk.post_id.clone(), hit.similarity))
                    }),
                    AggregationPolicy::Max,
                )
                .into_iter()
                .map(|(id, _)| id)
                .collect();
                let lexical: Vec<PostId> = lexical.into_iter().map(|(id, _)| id).collect();
                reciprocal_rank_fusion(&lexical, &semantic, config.rrf_k)
            }
        };

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(post_id, score)| PostHit {
                subject: self
                    .corpus
                    .get(&post_id)
                    .map(|post| post.subject.clone())
                    .unwrap_or_default(),
                post_id,
                score,
            })
            .collect())
    }

    fn chunk(&self, id: ChunkId) -> Option<&ChunkRecord> {
        self.chunks.get(id.as_u64() as usize)
    }

    /// Manifest the snapshot was built with.
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Corpus the snapshot was built from.
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Number of indexed chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingPolicy;
    use crate::corpus::Post;
    use crate::search::CURRENT_SCHEMA_VERSION;

    /// Builds a snapshot where each post has exactly the listed chunk
    /// embeddings (2-dimensional).
    fn snapshot(posts: &[(&str, &str, Vec<[f32; 2]>)]) -> IndexSnapshot {
        let mut corpus = Corpus::new();
        let mut chunks = Vec::new();
        let mut embeddings = Vec::new();
        for (id, content, vectors) in posts {
            corpus.insert(*id, Post::new(format!("Subject {id}"), *content));
            for (i, v) in vectors.iter().enumerate() {
                chunks.push(ChunkRecord {
                    post_id: PostId::from(*id),
                    subject: format!("Subject {id}"),
                    chunk_index: i,
                    text: content.to_string(),
                    post_hash: String::new(),
                });
                embeddings.push(v.to_vec());
            }
        }
        IndexSnapshot::from_persisted(PersistedIndex {
            manifest: IndexManifest {
                schema_version: CURRENT_SCHEMA_VERSION,
                corpus_hash: corpus.content_hash(),
                embedding_model: "test".to_string(),
                embedding_dim: 2,
                chunking: ChunkingPolicy::Sentence,
                post_count: corpus.len(),
                chunk_count: chunks.len(),
                built_at: 0,
            },
            corpus,
            chunks,
            embeddings,
        })
        .unwrap()
    }

    fn ids(hits: &[PostHit]) -> Vec<&str> {
        hits.iter().map(|h| h.post_id.as_str()).collect()
    }

    #[test]
    fn test_intersection_excludes_non_candidates() {
        // P7 is the best semantic match but falls outside the lexical top 1
        let snap = snapshot(&[
            ("P1", "github account setup", vec![[0.6, 0.8]]),
            ("P7", "unrelated words entirely", vec![[1.0, 0.0]]),
        ]);
        let config = RetrievalConfig {
            lexical_top_n: 1,
            ..RetrievalConfig::default()
        };
        let hits = snap.search("github", &[1.0, 0.0], &config, 10).unwrap();

        assert_eq!(ids(&hits), vec!["P1"]);
        assert!((hits[0].score - 0.6).abs() < 1e-4);
        assert_eq!(hits[0].subject, "Subject P1");
    }

    #[test]
    fn test_intersection_ranks_zero_score_candidates_semantically() {
        let snap = snapshot(&[
            ("1", "github account", vec![[0.6, 0.8]]),
            ("2", "midterm scope", vec![[1.0, 0.0]]),
        ]);
        let hits = snap
            .search("githb acount", &[1.0, 0.0], &RetrievalConfig::default(), 10)
            .unwrap();
        assert_eq!(ids(&hits), vec!["2", "1"]);
    }

    #[test]
    fn test_intersection_without_query_tokens_is_empty() {
        let snap = snapshot(&[("1", "github account", vec![[1.0, 0.0]])]);
        let hits = snap
            .search("?!", &[1.0, 0.0], &RetrievalConfig::default(), 10)
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_max_vs_sum_aggregation() {
        let snap = snapshot(&[
            ("1", "lab help", vec![[1.0, 0.0]]),
            ("2", "lab help too", vec![[0.8, 0.6], [0.8, 0.6]]),
        ]);
        let query = [1.0, 0.0];

        let max = snap
            .search("lab", &query, &RetrievalConfig::default(), 10)
            .unwrap();
        assert_eq!(ids(&max), vec!["1", "2"]);

        let sum_config = RetrievalConfig {
            aggregation: AggregationPolicy::Sum,
            ..RetrievalConfig::default()
        };
        let sum = snap.search("lab", &query, &sum_config, 10).unwrap();
        assert_eq!(ids(&sum), vec!["2", "1"]);
        assert!((sum[0].score - 1.6).abs() < 1e-3);
    }

    #[test]
    fn test_rrf_keeps_semantic_only_posts() {
        let snap = snapshot(&[
            ("1", "github account", vec![[0.0, 1.0]]),
            ("2", "unrelated words", vec![[1.0, 0.0]]),
        ]);
        let config = RetrievalConfig {
            strategy: FusionStrategy::ReciprocalRank,
            ..RetrievalConfig::default()
        };
        let hits = snap.search("github", &[1.0, 0.0], &config, 10).unwrap();

        // "1": lexical 1, semantic 2; "2": lexical 2 (score 0), semantic 1
        assert_eq!(ids(&hits), vec!["1", "2"]);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn test_results_bounded_and_descending() {
        let posts: Vec<(String, Vec<[f32; 2]>)> = (0..12)
            .map(|i| {
                let angle = i as f32 * 0.1;
                (format!("{i}"), vec![[angle.cos(), angle.sin()]])
            })
            .collect();
        let refs: Vec<(&str, &str, Vec<[f32; 2]>)> = posts
            .iter()
            .map(|(id, v)| (id.as_str(), "forum post", v.clone()))
            .collect();
        let snap = snapshot(&refs);

        let hits = snap
            .search("post", &[1.0, 0.0], &RetrievalConfig::default(), 5)
            .unwrap();
        assert_eq!(hits.len(), 5);
        for pair in hits.windows(2) {
            assert!(pair[0].score > pair[1].score);
        }
        let unique: HashSet<&str> = ids(&hits).into_iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_zero_k() {
        let snap = snapshot(&[("1", "github", vec![[1.0, 0.0]])]);
        assert!(snap
            .search("github", &[1.0, 0.0], &RetrievalConfig::default(), 0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let snap = snapshot(&[("1", "github", vec![[1.0, 0.0]])]);
        let err = snap.search("github", &[1.0, 0.0, 0.0], &RetrievalConfig::default(), 3);
        assert!(matches!(err, Err(SearchError::DimensionMismatch { .. })));
    }
}
