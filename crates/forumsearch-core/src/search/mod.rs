//! Hybrid retrieval: lexical filter plus semantic re-ranking.
//!
//! # Architecture
//!
//! - `types`: Core types (ChunkId, ChunkRecord, PostHit, IndexManifest, SearchError)
//! - `tokenizer`: Letter/digit tokenizer shared by BM25 and the offline embedder
//! - `keyword`: BM25 lexical candidate filter over whole posts
//! - `vector`: HNSW nearest-neighbour search over chunk embeddings
//! - `aggregation`: Chunk similarities collapsed per post (max or sum)
//! - `fusion`: Strategy selection and Reciprocal Rank Fusion
//! - `engine`: [`IndexSnapshot`], one immutable lexical + vector pair
//!
//! # Algorithm Details
//!
//! **Lexical (BM25)**: k1 = 1.2, b = 0.75; top-N posts sharing a query token.
//!
//! **Semantic (HNSW)**: cosine distance `d` in `[0, 2]`, similarity `1 - d`;
//! top-M chunks.
//!
//! **Intersection** (default): only chunks whose post is a lexical candidate
//! count; an empty candidate set gives an empty result.
//!
//! **Reciprocal Rank Fusion**: `1/(k + r_lex) + 1/(k + r_sem)`, k = 60; a
//! post missing from one ranking gets rank `len + 1` there.

pub mod types;

mod aggregation;
mod engine;
pub mod fusion;
pub mod keyword;
pub mod tokenizer;
pub mod vector;

pub use types::{
    get_current_timestamp, validate_dimension, ChunkHit, ChunkId, ChunkRecord, IndexManifest,
    PostHit, SearchError, CURRENT_SCHEMA_VERSION,
};

pub use aggregation::{aggregate_chunk_hits, AggregationPolicy};
pub use engine::IndexSnapshot;
pub use fusion::{reciprocal_rank_fusion, FusionStrategy};
pub use keyword::LexicalIndex;
pub use tokenizer::{tokenize, PostTokenizer};
pub use vector::{similarity_from_distance, VectorIndex};
