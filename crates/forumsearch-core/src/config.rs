//! Retrieval configuration.
//!
//! Constants define the production defaults; [`RetrievalConfig`] bundles
//! them into a serde-friendly struct so a caller can override individual
//! knobs while keeping the rest.
//!
//! # Usage
//!
//! ```
//! use forumsearch_core::config::{RetrievalConfig, DEFAULT_LEXICAL_TOP_N};
//! use forumsearch_core::search::FusionStrategy;
//!
//! let config = RetrievalConfig {
//!     strategy: FusionStrategy::ReciprocalRank,
//!     ..RetrievalConfig::default()
//! };
//! assert_eq!(config.lexical_top_n, DEFAULT_LEXICAL_TOP_N);
//! assert!(config.validate().is_ok());
//! ```

use crate::chunking::ChunkingPolicy;
use crate::search::{AggregationPolicy, FusionStrategy, SearchError};
use serde::{Deserialize, Serialize};

// =============================================================================
// Retrieval Defaults
// =============================================================================

/// Number of lexical candidates passed to the semantic stage.
pub const DEFAULT_LEXICAL_TOP_N: usize = 100;

/// Number of nearest chunks fetched from the vector index per query.
pub const DEFAULT_SEMANTIC_TOP_M: usize = 100;

/// Number of posts returned by a search when the caller does not say.
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Reciprocal rank fusion constant.
///
/// Cormack, Clarke & Buettcher (SIGIR 2009). Larger values flatten the
/// contribution of top-ranked items.
pub const RRF_K: usize = 60;

// =============================================================================
// Indexing Defaults
// =============================================================================

/// Chunk texts sent to the embedding provider per request.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;

/// Seconds between corpus refreshes in watch mode.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 5 * 60;

/// Tunable retrieval parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Lexical candidates kept (N)
    pub lexical_top_n: usize,
    /// Nearest chunks fetched (M)
    pub semantic_top_m: usize,
    /// RRF constant, only used by [`FusionStrategy::ReciprocalRank`]
    pub rrf_k: usize,
    /// How lexical and semantic rankings are combined
    pub strategy: FusionStrategy,
    /// How chunk similarities collapse into a post score
    pub aggregation: AggregationPolicy,
    /// How post text is split before embedding
    pub chunking: ChunkingPolicy,
    /// Chunk texts per embedding request
    pub embed_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_top_n: DEFAULT_LEXICAL_TOP_N,
            semantic_top_m: DEFAULT_SEMANTIC_TOP_M,
            rrf_k: RRF_K,
            strategy: FusionStrategy::default(),
            aggregation: AggregationPolicy::default(),
            chunking: ChunkingPolicy::default(),
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }
}

impl RetrievalConfig {
    /// Rejects configurations that would make every query degenerate.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.semantic_top_m == 0 {
            return Err(SearchError::InvalidConfig(
                "semantic_top_m must be at least 1".to_string(),
            ));
        }
        if self.strategy == FusionStrategy::Intersection && self.lexical_top_n == 0 {
            return Err(SearchError::InvalidConfig(
                "lexical_top_n must be at least 1 for the intersection strategy".to_string(),
            ));
        }
        if self.embed_batch_size == 0 {
            return Err(SearchError::InvalidConfig(
                "embed_batch_size must be at least 1".to_string(),
            ));
        }
        self.chunking
            .validate()
            .map_err(|e| SearchError::InvalidConfig(e.to_string()))
    }
}
