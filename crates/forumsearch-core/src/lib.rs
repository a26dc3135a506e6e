//! # forumsearch core
//!
//! Hybrid retrieval over the posts of a course discussion forum.
//!
//! A corpus snapshot (post id → post) is turned into two derived indexes: a
//! BM25 lexical index over whole posts and an HNSW vector index over post
//! chunks. Queries run through a lexical candidate filter and a semantic
//! stage that either intersects with the candidates or fuses both rankings.
//!
//! ## Modules
//!
//! - [`corpus`] - Post and corpus model, text cleaning, content hashing
//! - [`chunking`] - Whole-post, sentence, and sliding-window chunking
//! - [`embedding`] - Embedding provider trait and implementations
//! - [`search`] - Lexical filter, vector index, fusion and aggregation
//! - [`storage`] - Persistent index store (redb) and in-memory store
//! - [`processing`] - Rebuild pipeline (captions, chunking, embedding)
//! - [`service`] - Per-corpus state machine and the `search` entry point
//! - [`config`] - Retrieval defaults and [`config::RetrievalConfig`]
//! - [`error`] - Error types shared across modules

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod processing;
pub mod search;
pub mod service;
pub mod storage;

pub use config::RetrievalConfig;
pub use corpus::{Corpus, Post, PostId};
pub use search::{PostHit, SearchError};
pub use service::{CorpusId, IndexState, RefreshOutcome, SearchService};
