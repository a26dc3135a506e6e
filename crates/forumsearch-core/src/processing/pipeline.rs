//! Rebuild pipeline for one corpus.

use super::progress::{EmbeddingProgress, ProgressTimer};
use crate::chunking::{create_chunker, ChunkingPolicy};
use crate::config::DEFAULT_EMBED_BATCH_SIZE;
use crate::corpus::{clean_text, Corpus, Post, PostId};
use crate::embedding::{Captioner, Embedder};
use crate::error::EmbeddingError;
use crate::search::{
    get_current_timestamp, validate_dimension, ChunkRecord, IndexManifest, SearchError,
    CURRENT_SCHEMA_VERSION,
};
use crate::storage::PersistedIndex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Summary of one rebuild.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    /// Posts in the new snapshot
    pub posts: usize,
    /// Chunks in the new snapshot
    pub chunks: usize,
    /// Chunks carried over with their stored embeddings
    pub reused_chunks: usize,
    /// Chunks sent to the embedder
    pub embedded_chunks: usize,
    /// Images whose caption could not be produced
    pub failed_captions: usize,
    /// Wall time of the rebuild (milliseconds)
    pub elapsed_ms: u64,
}

/// Builds index snapshots from corpus snapshots.
///
/// Chunk records carry the content hash of the post as scraped (before any
/// captions are added), and the manifest carries the hash of the corpus as
/// passed in. The next rebuild compares against those, so captions produced
/// here never make an unchanged post look changed.
///
/// # Example
///
/// ```
/// use forumsearch_core::chunking::ChunkingPolicy;
/// use forumsearch_core::corpus::{Corpus, Post};
/// use forumsearch_core::embedding::HashingEmbedder;
/// use forumsearch_core::processing::IndexingPipeline;
/// use std::sync::Arc;
///
/// let mut corpus = Corpus::new();
/// corpus.insert("1", Post::new("Lab 0", "Create a GitHub account. Then fork the repo."));
///
/// let embedder = Arc::new(HashingEmbedder::new(64));
/// let pipeline = IndexingPipeline::new(embedder, ChunkingPolicy::Sentence);
/// let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// let (index, report) = runtime
///     .block_on(pipeline.build_index(&corpus, None, |_| {}))
///     .unwrap();
///
/// assert_eq!(report.chunks, 2);
/// assert_eq!(index.embeddings.len(), 2);
/// ```
pub struct IndexingPipeline {
    embedder: Arc<dyn Embedder>,
    captioner: Option<Arc<dyn Captioner>>,
    chunking: ChunkingPolicy,
    batch_size: usize,
}

impl IndexingPipeline {
    /// Creates a pipeline without captioning and with the default batch size.
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingPolicy) -> Self {
        Self {
            embedder,
            captioner: None,
            chunking,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    /// Captions images of new or changed posts that have no captions yet.
    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.captioner = Some(captioner);
        self
    }

    /// Sets the number of chunk texts per embedding request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns a reference to the embedder.
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Builds a complete snapshot of `corpus`.
    ///
    /// `previous` is the snapshot currently stored for the corpus, if any.
    /// When it was built with the same embedder and chunking policy, posts
    /// whose content hash is unchanged keep their chunks, embeddings, and
    /// captions.
    ///
    /// # Errors
    ///
    /// Any embedding failure aborts the build: a snapshot is either complete
    /// or not produced. Caption failures are logged and skipped.
    #[instrument(skip_all, fields(posts = corpus.len()))]
    pub async fn build_index<F>(
        &self,
        corpus: &Corpus,
        previous: Option<&PersistedIndex>,
        mut on_progress: F,
    ) -> Result<(PersistedIndex, RebuildReport), SearchError>
    where
        F: FnMut(EmbeddingProgress),
    {
        let timer = ProgressTimer::new();
        let model_id = self.embedder.model_id().to_string();
        let dimension = self.embedder.embedding_dim();
        let chunker = create_chunker(self.chunking)?;

        let reusable = match previous {
            Some(prev) => match prev.validate() {
                Err(e) => {
                    warn!("Stored index is inconsistent ({}); re-embedding everything", e);
                    None
                }
                Ok(())
                    if prev
                        .manifest
                        .embeddings_reusable(&model_id, dimension, &self.chunking) =>
                {
                    Some(prev)
                }
                Ok(()) => {
                    info!(
                        "Stored index uses {} ({} dims, {:?}); re-embedding everything",
                        prev.manifest.embedding_model,
                        prev.manifest.embedding_dim,
                        prev.manifest.chunking
                    );
                    None
                }
            },
            None => None,
        };
        let previous_chunks = reusable.map(chunks_by_post).unwrap_or_default();

        let mut indexed = Corpus::new();
        let mut chunks: Vec<ChunkRecord> = Vec::new();
        let mut embeddings: Vec<Option<Vec<f32>>> = Vec::new();
        let mut pending: Vec<usize> = Vec::new();
        let mut reused_chunks = 0;
        let mut failed_captions = 0;

        for (post_id, post) in corpus.iter() {
            let post_hash = post.content_hash();

            if let (Some(prev), Some(positions)) = (reusable, previous_chunks.get(post_id)) {
                if positions
                    .first()
                    .is_some_and(|&i| prev.chunks[i].post_hash == post_hash)
                {
                    for &i in positions {
                        chunks.push(prev.chunks[i].clone());
                        embeddings.push(Some(prev.embeddings[i].clone()));
                    }
                    reused_chunks += positions.len();
                    let kept = prev
                        .corpus
                        .get(post_id)
                        .cloned()
                        .unwrap_or_else(|| post.clone());
                    indexed.insert(post_id.clone(), kept);
                    continue;
                }
            }

            let mut post = post.clone();
            failed_captions += self.caption_post(post_id, &mut post).await;

            for chunk in chunker.chunk(&clean_text(&post.full_text()))? {
                pending.push(chunks.len());
                chunks.push(ChunkRecord {
                    post_id: post_id.clone(),
                    subject: post.subject.clone(),
                    chunk_index: chunk.index,
                    text: chunk.text,
                    post_hash: post_hash.clone(),
                });
                embeddings.push(None);
            }
            indexed.insert(post_id.clone(), post);
        }

        debug!(
            "{} chunks ({} reused, {} to embed) with {} chunker",
            chunks.len(),
            reused_chunks,
            pending.len(),
            chunker.name()
        );

        let batches_total = pending.len().div_ceil(self.batch_size);
        let mut chunks_embedded = 0;
        for (batch_index, batch) in pending.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|&i| chunks[i].text.clone()).collect();
            let vectors = self.embedder.embed_documents(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(SearchError::Embedding(EmbeddingError::InvalidResponse(
                    format!("{} embeddings for {} chunks", vectors.len(), batch.len()),
                )));
            }
            for (&i, vector) in batch.iter().zip(vectors) {
                validate_dimension(dimension, vector.len())?;
                embeddings[i] = Some(vector);
            }

            chunks_embedded += batch.len();
            on_progress(EmbeddingProgress {
                batches_completed: batch_index + 1,
                batches_total,
                chunks_embedded,
                elapsed_ms: timer.elapsed_ms(),
            });
        }

        let embeddings = embeddings
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| SearchError::Index("chunk left without an embedding".to_string()))?;

        let manifest = IndexManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            corpus_hash: corpus.content_hash(),
            embedding_model: model_id,
            embedding_dim: dimension,
            chunking: self.chunking,
            post_count: indexed.len(),
            chunk_count: chunks.len(),
            built_at: get_current_timestamp(),
        };
        let report = RebuildReport {
            posts: indexed.len(),
            chunks: chunks.len(),
            reused_chunks,
            embedded_chunks: chunks_embedded,
            failed_captions,
            elapsed_ms: timer.elapsed_ms(),
        };

        Ok((
            PersistedIndex {
                manifest,
                corpus: indexed,
                chunks,
                embeddings,
            },
            report,
        ))
    }

    /// Fills in missing captions; returns the number of images that failed.
    async fn caption_post(&self, post_id: &PostId, post: &mut Post) -> usize {
        let Some(captioner) = &self.captioner else {
            return 0;
        };
        if !post.captions.is_empty() || post.image_urls.is_empty() {
            return 0;
        }

        let mut failed = 0;
        for url in &post.image_urls {
            match captioner.caption(url).await {
                Ok(caption) => post.captions.push(caption),
                Err(e) => {
                    warn!("Skipping image {} of post {}: {}", url, post_id, e);
                    failed += 1;
                }
            }
        }
        failed
    }
}

/// Positions of each post's chunks in a stored chunk table.
fn chunks_by_post(index: &PersistedIndex) -> HashMap<&PostId, Vec<usize>> {
    let mut positions: HashMap<&PostId, Vec<usize>> = HashMap::new();
    for (i, chunk) in index.chunks.iter().enumerate() {
        positions.entry(&chunk.post_id).or_default().push(i);
    }
    positions
}
