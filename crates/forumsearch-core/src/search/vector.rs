// rust-cv/hnsw vector index over chunk embeddings

use super::types::{validate_dimension, ChunkHit, ChunkId, SearchError};
use hnsw::{Hnsw, Searcher};
use space::{Metric, Neighbor};
use tracing::instrument;

/// Minimum ef_search parameter for HNSW queries.
///
/// Queries use max(k * 2, MIN_EF_SEARCH) so recall scales with the result
/// count while keeping a quality floor.
const MIN_EF_SEARCH: usize = 50;

/// Scale between cosine distance in [0, 2] and the u32 metric unit.
const DISTANCE_SCALE: f32 = u32::MAX as f32 / 2.0;

/// Cosine distance metric for embedding vectors
/// Computes 1 - cosine_similarity, scaled to u32
struct CosineDistance;

impl Metric<Box<[f32]>> for CosineDistance {
    type Unit = u32;

    fn distance(&self, a: &Box<[f32]>, b: &Box<[f32]>) -> u32 {
        let a_slice: &[f32] = a;
        let b_slice: &[f32] = b;

        let dot: f32 = a_slice
            .iter()
            .zip(b_slice.iter())
            .map(|(&x, &y)| x * y)
            .sum();
        let mag_a: f32 = a_slice.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mag_b: f32 = b_slice.iter().map(|y| y * y).sum::<f32>().sqrt();

        if mag_a == 0.0 || mag_b == 0.0 {
            return u32::MAX; // Zero vectors sit at maximum distance (2)
        }

        let distance = (1.0 - dot / (mag_a * mag_b)).clamp(0.0, 2.0);
        (distance * DISTANCE_SCALE) as u32
    }
}

/// Converts a cosine distance in `[0, 2]` to a similarity in `[-1, 1]`.
///
/// ```
/// use forumsearch_core::search::similarity_from_distance;
///
/// assert_eq!(similarity_from_distance(0.0), 1.0);
/// assert_eq!(similarity_from_distance(2.0), -1.0);
/// assert_eq!(similarity_from_distance(2.5), -1.0);
/// ```
pub fn similarity_from_distance(distance: f32) -> f32 {
    (1.0 - distance).clamp(-1.0, 1.0)
}

/// Read-only HNSW index over the chunks of one snapshot.
///
/// # HNSW Parameters
///
/// - **M = 16**: bidirectional links per node at layers > 0
/// - **M0 = 32**: links at layer 0 (2*M)
///
/// Reference: "Efficient and robust approximate nearest neighbor search using
/// Hierarchical Navigable Small World graphs" by Malkov & Yashunin (2018).
pub struct VectorIndex {
    /// Type parameters: <Metric, Data, RNG, M, M0>
    index: Hnsw<CosineDistance, Box<[f32]>, rand::rngs::StdRng, 16, 32>,
    /// Map from HNSW index position to ChunkId
    chunk_ids: Vec<ChunkId>,
    /// Dimensionality of embeddings
    dimension: usize,
}

impl VectorIndex {
    /// Creates an empty index for embeddings of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            index: Hnsw::new(CosineDistance),
            chunk_ids: Vec::new(),
            dimension,
        }
    }

    /// Builds an index from `(chunk, embedding)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::DimensionMismatch` if any embedding has the
    /// wrong length.
    #[instrument(skip_all, fields(dimension = dimension))]
    pub fn build<I>(dimension: usize, embeddings: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = (ChunkId, Vec<f32>)>,
    {
        let mut vector_index = Self::new(dimension);
        let mut searcher = Searcher::default();
        for (chunk_id, embedding) in embeddings {
            vector_index.insert(chunk_id, embedding, &mut searcher)?;
        }
        Ok(vector_index)
    }

    fn insert(
        &mut self,
        chunk_id: ChunkId,
        embedding: Vec<f32>,
        searcher: &mut Searcher<u32>,
    ) -> Result<(), SearchError> {
        validate_dimension(self.dimension, embedding.len())?;
        self.chunk_ids.push(chunk_id);
        self.index.insert(embedding.into_boxed_slice(), searcher);
        Ok(())
    }

    /// Returns the `k` nearest chunks, most similar first.
    ///
    /// A fresh searcher is used per call so concurrent queries can share the
    /// index through `&self`.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::DimensionMismatch` if the query embedding has
    /// the wrong length.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ChunkHit>, SearchError> {
        validate_dimension(self.dimension, query_embedding.len())?;

        if self.chunk_ids.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let actual_k = std::cmp::min(k, self.chunk_ids.len());
        let mut neighbors = vec![
            Neighbor {
                index: !0,
                distance: !0
            };
            actual_k
        ];
        let ef_search = std::cmp::max(k * 2, MIN_EF_SEARCH);
        let query_box = query_embedding.to_vec().into_boxed_slice();
        let mut searcher = Searcher::default();

        let found = self
            .index
            .nearest(&query_box, ef_search, &mut searcher, &mut neighbors);

        let mut hits: Vec<ChunkHit> = found
            .iter()
            .filter(|n| n.index != !0)
            .filter_map(|neighbor| {
                let distance = neighbor.distance as f32 / DISTANCE_SCALE;
                self.chunk_ids.get(neighbor.index).map(|&chunk_id| ChunkHit {
                    chunk_id,
                    similarity: similarity_from_distance(distance),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        Ok(hits)
    }

    /// Get number of indexed chunks
    pub fn len(&self) -> usize {
        self.chunk_ids.len()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }

    /// Embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
