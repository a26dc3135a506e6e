//! Per-corpus index lifecycle and the query entry point.
//!
//! A [`SearchService`] owns one slot per attached corpus. Each slot moves
//! through [`IndexState`]:
//!
//! ```text
//! Absent ──ensure_ready/rebuild──▶ Building ──ok──▶ Ready
//!   ▲                                 │                │
//!   └──────────── error ──────────────┘                │
//!                                     ▲                │
//!                                     └─ hash change ──┘
//! ```
//!
//! A failed rebuild restores the state it started from. Snapshots are
//! immutable and swapped whole; a search keeps the `Arc` it started with.

use crate::config::{RetrievalConfig, DEFAULT_RESULT_LIMIT};
use crate::corpus::Corpus;
use crate::embedding::{Captioner, Embedder};
use crate::processing::{IndexingPipeline, RebuildReport};
use crate::search::{IndexManifest, IndexSnapshot, PostHit, SearchError};
use crate::storage::IndexStore;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

/// Identifier of one corpus (one course).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorpusId(String);

impl CorpusId {
    /// Creates a corpus id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorpusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorpusId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CorpusId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for CorpusId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of one corpus index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// No snapshot loaded
    Absent,
    /// A rebuild is running
    Building,
    /// A snapshot is loaded and serving queries
    Ready,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexState::Absent => "absent",
            IndexState::Building => "building",
            IndexState::Ready => "ready",
        })
    }
}

/// Result of [`SearchService::ensure_ready`] and [`SearchService::rebuild`].
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The loaded snapshot already matches the corpus
    Unchanged,
    /// A new snapshot was built, persisted, and swapped in
    Rebuilt(RebuildReport),
}

struct CorpusIndex<S> {
    store: S,
    state: Mutex<IndexState>,
    snapshot: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl<S> CorpusIndex<S> {
    fn state(&self) -> IndexState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: IndexState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Moves to `Building`; returns the state to restore on failure.
    fn begin_rebuild(&self, corpus_id: &str) -> Result<IndexState, SearchError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state == IndexState::Building {
            return Err(SearchError::RebuildInProgress {
                corpus_id: corpus_id.to_string(),
            });
        }
        Ok(std::mem::replace(&mut *state, IndexState::Building))
    }

    fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn swap_snapshot(&self, snapshot: IndexSnapshot) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(snapshot));
    }
}

/// Hybrid search over any number of corpora.
///
/// Holds the embedder used for both chunks and queries, an optional image
/// captioner, and the retrieval configuration. Nothing is global: every
/// corpus is attached with its own [`IndexStore`].
///
/// # Example
///
/// ```
/// use forumsearch_core::corpus::{Corpus, Post};
/// use forumsearch_core::embedding::HashingEmbedder;
/// use forumsearch_core::storage::InMemoryIndexStore;
/// use forumsearch_core::{RetrievalConfig, SearchService};
/// use std::sync::Arc;
///
/// let mut corpus = Corpus::new();
/// corpus.insert("1", Post::new("Lab 0", "How do I create a GitHub account?"));
/// corpus.insert("2", Post::new("Midterm", "What is the exam scope?"));
///
/// let embedder = Arc::new(HashingEmbedder::default());
/// let service = SearchService::new(embedder, RetrievalConfig::default()).unwrap();
/// service.attach("cs101", InMemoryIndexStore::new());
///
/// let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// runtime.block_on(async {
///     service.ensure_ready("cs101", &corpus).await.unwrap();
///     let hits = service.search("cs101", "github account", None).await.unwrap();
///     assert_eq!(hits[0].post_id.as_str(), "1");
/// });
/// ```
pub struct SearchService<S: IndexStore> {
    embedder: Arc<dyn Embedder>,
    captioner: Option<Arc<dyn Captioner>>,
    config: RetrievalConfig,
    corpora: RwLock<HashMap<CorpusId, Arc<CorpusIndex<S>>>>,
}

impl<S: IndexStore> SearchService<S> {
    /// Creates a service with no corpora attached.
    ///
    /// # Errors
    ///
    /// `SearchError::InvalidConfig` if `config` does not validate.
    pub fn new(embedder: Arc<dyn Embedder>, config: RetrievalConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            embedder,
            captioner: None,
            config,
            corpora: RwLock::new(HashMap::new()),
        })
    }

    /// Captions images of new or changed posts during rebuilds.
    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.captioner = Some(captioner);
        self
    }

    /// Returns the retrieval configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Returns the embedder shared by indexing and queries.
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Registers a corpus with its store. The corpus starts `Absent`;
    /// attaching an id again replaces its slot.
    pub fn attach(&self, corpus_id: impl Into<CorpusId>, store: S) {
        let corpus_id = corpus_id.into();
        debug!("Attaching corpus {}", corpus_id);
        let entry = Arc::new(CorpusIndex {
            store,
            state: Mutex::new(IndexState::Absent),
            snapshot: RwLock::new(None),
        });
        self.corpora
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(corpus_id, entry);
    }

    /// Removes a corpus and drops its store once no operation still holds it.
    /// Returns `false` if the id was not attached.
    pub fn detach(&self, corpus_id: &str) -> bool {
        debug!("Detaching corpus {}", corpus_id);
        self.corpora
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(corpus_id)
            .is_some()
    }

    /// Ids of every attached corpus, sorted.
    pub fn corpora(&self) -> Vec<CorpusId> {
        let mut ids: Vec<CorpusId> = self
            .corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn entry(&self, corpus_id: &str) -> Result<Arc<CorpusIndex<S>>, SearchError> {
        self.corpora
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(corpus_id)
            .cloned()
            .ok_or_else(|| SearchError::NotFound {
                corpus_id: corpus_id.to_string(),
            })
    }

    /// Current state of a corpus; `Absent` if it was never attached.
    pub fn state(&self, corpus_id: &str) -> IndexState {
        self.entry(corpus_id)
            .map(|entry| entry.state())
            .unwrap_or(IndexState::Absent)
    }

    /// Manifest of the loaded snapshot, if any.
    pub fn manifest(&self, corpus_id: &str) -> Option<IndexManifest> {
        self.entry(corpus_id)
            .ok()?
            .snapshot()
            .map(|snapshot| snapshot.manifest().clone())
    }

    /// Loads the persisted snapshot, without calling the embedder.
    ///
    /// A snapshot written by another embedding model, another dimension, or
    /// an unknown schema version is ignored and the corpus stays `Absent`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the corpus is not attached, `RebuildInProgress` while a
    /// rebuild runs, `Storage` if the store cannot be read.
    #[instrument(skip(self))]
    pub async fn open(&self, corpus_id: &str) -> Result<IndexState, SearchError> {
        let entry = self.entry(corpus_id)?;
        let previous = entry.begin_rebuild(corpus_id)?;

        let loaded = self.load_snapshot(&entry).await;
        let state = match loaded {
            Ok(Some(snapshot)) => {
                info!(
                    "Loaded index for {}: {} posts, {} chunks",
                    corpus_id,
                    snapshot.manifest().post_count,
                    snapshot.chunk_count()
                );
                entry.swap_snapshot(snapshot);
                IndexState::Ready
            }
            Ok(None) => previous,
            Err(e) => {
                entry.set_state(previous);
                return Err(e);
            }
        };
        entry.set_state(state);
        Ok(state)
    }

    async fn load_snapshot(
        &self,
        entry: &CorpusIndex<S>,
    ) -> Result<Option<IndexSnapshot>, SearchError> {
        let Some(persisted) = entry.store.load_index().await? else {
            return Ok(None);
        };
        let manifest = &persisted.manifest;
        if !manifest.is_compatible()
            || manifest.embedding_model != self.embedder.model_id()
            || manifest.embedding_dim != self.embedder.embedding_dim()
        {
            warn!(
                "Stored index (schema v{}, {} with {} dims) does not match embedder {} ({} dims)",
                manifest.schema_version,
                manifest.embedding_model,
                manifest.embedding_dim,
                self.embedder.model_id(),
                self.embedder.embedding_dim()
            );
            return Ok(None);
        }
        IndexSnapshot::from_persisted(persisted).map(Some)
    }

    /// Makes sure the loaded snapshot reflects `corpus`.
    ///
    /// An `Absent` corpus first tries its persisted snapshot. If the loaded
    /// snapshot has the same corpus hash, embedder, and chunking policy this
    /// is a no-op; otherwise the index is rebuilt.
    pub async fn ensure_ready(
        &self,
        corpus_id: &str,
        corpus: &Corpus,
    ) -> Result<RefreshOutcome, SearchError> {
        let entry = self.entry(corpus_id)?;
        if entry.state() == IndexState::Absent {
            self.open(corpus_id).await?;
        }

        if let Some(snapshot) = entry.snapshot() {
            let manifest = snapshot.manifest();
            if manifest.corpus_hash == corpus.content_hash()
                && manifest.embeddings_reusable(
                    self.embedder.model_id(),
                    self.embedder.embedding_dim(),
                    &self.config.chunking,
                )
            {
                debug!("Index for {} is up to date", corpus_id);
                return Ok(RefreshOutcome::Unchanged);
            }
        }

        self.rebuild(corpus_id, corpus).await
    }

    /// Rebuilds the index regardless of the corpus hash.
    ///
    /// Unchanged posts still reuse their stored embeddings.
    ///
    /// # Errors
    ///
    /// `RebuildInProgress` if another rebuild of the same corpus is running.
    /// On any failure the previous snapshot and state stay in place.
    #[instrument(skip(self, corpus), fields(posts = corpus.len()))]
    pub async fn rebuild(
        &self,
        corpus_id: &str,
        corpus: &Corpus,
    ) -> Result<RefreshOutcome, SearchError> {
        let entry = self.entry(corpus_id)?;
        let previous = entry.begin_rebuild(corpus_id)?;

        match self.build_and_persist(corpus_id, &entry, corpus).await {
            Ok((snapshot, report)) => {
                entry.swap_snapshot(snapshot);
                entry.set_state(IndexState::Ready);
                info!(
                    "Rebuilt {}: {} posts, {} chunks ({} reused, {} embedded) in {}ms",
                    corpus_id,
                    report.posts,
                    report.chunks,
                    report.reused_chunks,
                    report.embedded_chunks,
                    report.elapsed_ms
                );
                Ok(RefreshOutcome::Rebuilt(report))
            }
            Err(e) => {
                warn!("Rebuild of {} failed: {}", corpus_id, e);
                entry.set_state(previous);
                Err(e)
            }
        }
    }

    async fn build_and_persist(
        &self,
        corpus_id: &str,
        entry: &CorpusIndex<S>,
        corpus: &Corpus,
    ) -> Result<(IndexSnapshot, RebuildReport), SearchError> {
        let previous = entry.store.load_index().await?;

        let mut pipeline = IndexingPipeline::new(self.embedder.clone(), self.config.chunking)
            .with_batch_size(self.config.embed_batch_size);
        if let Some(captioner) = &self.captioner {
            pipeline = pipeline.with_captioner(captioner.clone());
        }

        let (index, report) = pipeline
            .build_index(corpus, previous.as_ref(), |progress| {
                debug!(
                    "{}: embedded {} chunks ({:.0}%)",
                    corpus_id,
                    progress.chunks_embedded,
                    progress.percent_complete()
                );
            })
            .await?;

        let snapshot = IndexSnapshot::from_persisted(index.clone())?;
        entry.store.replace_index(&index).await?;
        Ok((snapshot, report))
    }

    /// Ranks the posts of a corpus for a free-text query.
    ///
    /// `k` defaults to [`DEFAULT_RESULT_LIMIT`].
    ///
    /// # Errors
    ///
    /// `NotFound` if the corpus has no loaded snapshot (never an empty list),
    /// `Embedding` if the query cannot be embedded.
    #[instrument(skip(self, k))]
    pub async fn search(
        &self,
        corpus_id: &str,
        query: &str,
        k: impl Into<Option<usize>>,
    ) -> Result<Vec<PostHit>, SearchError> {
        let k = k.into().unwrap_or(DEFAULT_RESULT_LIMIT);
        let snapshot = self
            .entry(corpus_id)?
            .snapshot()
            .ok_or_else(|| SearchError::NotFound {
                corpus_id: corpus_id.to_string(),
            })?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        snapshot.search(query, &query_embedding, &self.config, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Post, PostId};
    use crate::embedding::testing::{RecordingEmbedder, UrlCaptioner};
    use crate::embedding::HashingEmbedder;
    use crate::error::EmbeddingError;
    use crate::storage::InMemoryIndexStore;
    use async_trait::async_trait;

    fn corpus() -> Corpus {
        let mut corpus = Corpus::new();
        corpus.insert("1", Post::new("Lab 0", "How do I create a GitHub account?"));
        corpus.insert("2", Post::new("Midterm", "What is the exam scope?"));
        corpus.insert("3", Post::new("Lab 1", "My account was locked after login."));
        corpus
    }

    fn service(embedder: Arc<dyn Embedder>) -> SearchService<InMemoryIndexStore> {
        SearchService::new(embedder, RetrievalConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_search_without_index_is_not_found() {
        let service = service(Arc::new(HashingEmbedder::default()));
        let err = service.search("cs101", "github", None).await.unwrap_err();
        assert!(matches!(err, SearchError::NotFound { .. }));

        service.attach("cs101", InMemoryIndexStore::new());
        assert_eq!(service.state("cs101"), IndexState::Absent);
        let err = service.search("cs101", "github", None).await.unwrap_err();
        assert_eq!(err.to_string(), "No index available for corpus 'cs101'");
    }

    #[tokio::test]
    async fn test_ensure_ready_builds_then_skips() {
        let embedder = Arc::new(RecordingEmbedder::new("recording"));
        let service = service(embedder.clone());
        let store = InMemoryIndexStore::new();
        service.attach("cs101", store.clone());

        let outcome = service.ensure_ready("cs101", &corpus()).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Rebuilt(ref r) if r.posts == 3));
        assert_eq!(service.state("cs101"), IndexState::Ready);
        assert_eq!(store.chunk_count().await.unwrap(), 3);

        let embedded = embedder.embedded_texts();
        let outcome = service.ensure_ready("cs101", &corpus()).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Unchanged);
        assert_eq!(embedder.embedded_texts(), embedded);
    }

    #[tokio::test]
    async fn test_hash_change_rebuilds_incrementally() {
        let embedder = Arc::new(RecordingEmbedder::new("recording"));
        let service = service(embedder.clone());
        service.attach("cs101", InMemoryIndexStore::new());
        service.ensure_ready("cs101", &corpus()).await.unwrap();
        let before = embedder.embedded_texts();

        let mut changed = corpus();
        changed.insert("4", Post::new("Homework", "Deadline extension?"));
        let outcome = service.ensure_ready("cs101", &changed).await.unwrap();

        match outcome {
            RefreshOutcome::Rebuilt(report) => {
                assert_eq!(report.reused_chunks, 3);
                assert_eq!(report.embedded_chunks, 1);
            }
            other => panic!("expected a rebuild, got {other:?}"),
        }
        assert_eq!(embedder.embedded_texts(), before + 1);
        assert_eq!(
            service.manifest("cs101").unwrap().corpus_hash,
            changed.content_hash()
        );
    }

    #[tokio::test]
    async fn test_forced_rebuild_ignores_hash() {
        let service = service(Arc::new(HashingEmbedder::default()));
        service.attach("cs101", InMemoryIndexStore::new());
        service.ensure_ready("cs101", &corpus()).await.unwrap();

        let outcome = service.rebuild("cs101", &corpus()).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Rebuilt(ref r) if r.reused_chunks == 3));
    }

    #[tokio::test]
    async fn test_open_loads_without_embedding() {
        let builder = service(Arc::new(RecordingEmbedder::new("recording")));
        let store = InMemoryIndexStore::new();
        builder.attach("cs101", store.clone());
        builder.ensure_ready("cs101", &corpus()).await.unwrap();

        let embedder = Arc::new(RecordingEmbedder::new("recording"));
        let reader = service(embedder.clone());
        reader.attach("cs101", store);
        assert_eq!(reader.open("cs101").await.unwrap(), IndexState::Ready);
        assert_eq!(embedder.embedded_texts(), 0);

        let outcome = reader.ensure_ready("cs101", &corpus()).await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_open_ignores_index_from_other_model() {
        let builder = service(Arc::new(RecordingEmbedder::new("old-model")));
        let store = InMemoryIndexStore::new();
        builder.attach("cs101", store.clone());
        builder.ensure_ready("cs101", &corpus()).await.unwrap();

        let embedder = Arc::new(RecordingEmbedder::new("new-model"));
        let reader = service(embedder.clone());
        reader.attach("cs101", store);
        assert_eq!(reader.open("cs101").await.unwrap(), IndexState::Absent);

        let outcome = reader.ensure_ready("cs101", &corpus()).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Rebuilt(ref r) if r.reused_chunks == 0));
        assert_eq!(embedder.embedded_texts(), 3);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_snapshot() {
        let embedder = Arc::new(RecordingEmbedder::new("recording"));
        let service = service(embedder.clone());
        service.attach("cs101", InMemoryIndexStore::new());
        service.ensure_ready("cs101", &corpus()).await.unwrap();
        let manifest = service.manifest("cs101").unwrap();

        embedder.fail.set(true);
        let mut changed = corpus();
        changed.insert("4", Post::new("Homework", "Deadline extension?"));
        let err = service.ensure_ready("cs101", &changed).await.unwrap_err();

        assert!(matches!(err, SearchError::Embedding(_)));
        assert_eq!(service.state("cs101"), IndexState::Ready);
        assert_eq!(service.manifest("cs101"), Some(manifest));
    }

    #[tokio::test]
    async fn test_failed_first_build_stays_absent() {
        let embedder = Arc::new(RecordingEmbedder::new("recording"));
        embedder.fail.set(true);
        let service = service(embedder);
        service.attach("cs101", InMemoryIndexStore::new());

        assert!(service.ensure_ready("cs101", &corpus()).await.is_err());
        assert_eq!(service.state("cs101"), IndexState::Absent);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_surfaces() {
        let embedder = Arc::new(RecordingEmbedder::new("recording"));
        let service = service(embedder.clone());
        service.attach("cs101", InMemoryIndexStore::new());
        service.ensure_ready("cs101", &corpus()).await.unwrap();

        embedder.fail.set(true);
        let err = service.search("cs101", "github", None).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::Embedding(EmbeddingError::RequestFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_caption_failure_does_not_abort() {
        let service = service(Arc::new(HashingEmbedder::default()))
            .with_captioner(Arc::new(UrlCaptioner::new()));
        service.attach("cs101", InMemoryIndexStore::new());

        let mut corpus = corpus();
        let mut post = Post::new("Lab 2", "Error screenshot attached");
        post.image_urls = vec!["https://img/broken.png".to_string()];
        corpus.insert("5", post);

        let outcome = service.ensure_ready("cs101", &corpus).await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Rebuilt(ref r) if r.failed_captions == 1));
        assert_eq!(service.state("cs101"), IndexState::Ready);
    }

    #[tokio::test]
    async fn test_detach_forgets_corpus() {
        let service = service(Arc::new(HashingEmbedder::default()));
        let store = InMemoryIndexStore::new();
        service.attach("cs101", store.clone());
        service.ensure_ready("cs101", &corpus()).await.unwrap();

        assert!(service.detach("cs101"));
        assert!(!service.detach("cs101"));
        assert!(service.corpora().is_empty());
        assert_eq!(service.state("cs101"), IndexState::Absent);
        assert!(matches!(
            service.search("cs101", "github", None).await,
            Err(SearchError::NotFound { .. })
        ));

        // The persisted index survives and is served again after re-attaching
        service.attach("cs101", store);
        assert_eq!(service.open("cs101").await.unwrap(), IndexState::Ready);
    }

    #[tokio::test]
    async fn test_search_ranks_and_defaults_k() {
        let service = service(Arc::new(HashingEmbedder::default()));
        service.attach("cs101", InMemoryIndexStore::new());
        service.ensure_ready("cs101", &corpus()).await.unwrap();

        let hits = service.search("cs101", "github account", None).await.unwrap();
        assert_eq!(hits[0].post_id, PostId::from("1"));
        assert_eq!(hits[0].subject, "Lab 0");
        assert!(hits[0].score > 0.0);
        assert!(hits.len() <= DEFAULT_RESULT_LIMIT);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().any(|h| h.post_id == PostId::from("2")));

        let one = service.search("cs101", "github account", 1).await.unwrap();
        assert_eq!(one.len(), 1);
        assert!(service.search("cs101", "github", 0).await.unwrap().is_empty());
    }

    /// Yields once per batch so two rebuilds can interleave on one task.
    struct YieldingEmbedder(HashingEmbedder);

    #[async_trait(?Send)]
    impl Embedder for YieldingEmbedder {
        fn model_id(&self) -> &str {
            self.0.model_id()
        }

        fn embedding_dim(&self) -> usize {
            self.0.embedding_dim()
        }

        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            tokio::task::yield_now().await;
            self.0.embed_documents(texts).await
        }
    }

    #[tokio::test]
    async fn test_one_rebuild_at_a_time() {
        let service = service(Arc::new(YieldingEmbedder(HashingEmbedder::default())));
        service.attach("cs101", InMemoryIndexStore::new());
        let corpus = corpus();

        let (first, second) = tokio::join!(
            service.rebuild("cs101", &corpus),
            service.rebuild("cs101", &corpus)
        );
        assert!(first.is_ok());
        assert!(matches!(second, Err(SearchError::RebuildInProgress { .. })));
        assert_eq!(service.state("cs101"), IndexState::Ready);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = RetrievalConfig {
            semantic_top_m: 0,
            ..RetrievalConfig::default()
        };
        assert!(SearchService::<InMemoryIndexStore>::new(
            Arc::new(HashingEmbedder::default()),
            config
        )
        .is_err());
    }
}
