//! Index maintenance: rebuild, watch, and status.

use crate::config;
use crate::registry::CourseRegistry;
use crate::search::ensure_registered;
use anyhow::{Context, Result};
use forumsearch_core::corpus::Corpus;
use forumsearch_core::embedding::Embedder;
use forumsearch_core::storage::{IndexStore, RedbIndexStore};
use forumsearch_core::{IndexState, RefreshOutcome, RetrievalConfig, SearchService};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Brings one course's index up to date with its `posts.json`.
///
/// The course database is attached only for the duration of the refresh.
/// redb locks the file exclusively, so keeping it attached would make
/// concurrent `search` and `status` invocations fail.
pub async fn refresh_course(
    service: &SearchService<RedbIndexStore>,
    data_dir: &Path,
    course: &str,
    force: bool,
) -> Result<RefreshOutcome> {
    let corpus_path = config::corpus_path(data_dir, course);
    let corpus = Corpus::load(&corpus_path)
        .with_context(|| format!("Failed to load corpus for {}", course))?;

    let db_path = config::index_path(data_dir, course);
    let store = RedbIndexStore::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    service.attach(course, store);

    let outcome = if force {
        service.rebuild(course, &corpus).await
    } else {
        service.ensure_ready(course, &corpus).await
    };
    service.detach(course);
    Ok(outcome?)
}

/// Refreshes the given courses, or every registered course if none are named.
pub async fn rebuild_courses(
    data_dir: &Path,
    embedder: Arc<dyn Embedder>,
    retrieval: RetrievalConfig,
    courses: &[String],
    force: bool,
) -> Result<Vec<(String, RefreshOutcome)>> {
    let registry = CourseRegistry::load(&config::registry_path(data_dir))?;
    let courses = selected_courses(&registry, courses)?;
    let service = SearchService::new(embedder, retrieval)?;

    let mut outcomes = Vec::with_capacity(courses.len());
    for course in courses {
        let outcome = refresh_course(&service, data_dir, &course, force).await?;
        outcomes.push((course, outcome));
    }
    Ok(outcomes)
}

/// Refreshes every registered course, then sleeps, until the process ends.
///
/// The registry is re-read on every pass so newly registered courses are
/// picked up. A failing course is logged and retried on the next pass. No
/// database stays open while sleeping.
pub async fn watch(
    data_dir: &Path,
    embedder: Arc<dyn Embedder>,
    retrieval: RetrievalConfig,
    interval: Duration,
    once: bool,
) -> Result<()> {
    let service = SearchService::new(embedder, retrieval)?;

    loop {
        let registry = CourseRegistry::load(&config::registry_path(data_dir))?;
        for course in registry.courses() {
            if let Err(e) = config::validate_course_id(course) {
                warn!("Skipping course: {:#}", e);
                continue;
            }
            match refresh_course(&service, data_dir, course, false).await {
                Ok(RefreshOutcome::Unchanged) => info!("{}: up to date", course),
                Ok(RefreshOutcome::Rebuilt(report)) => info!(
                    "{}: rebuilt {} posts ({} chunks embedded)",
                    course, report.posts, report.embedded_chunks
                ),
                Err(e) => warn!("{}: refresh failed: {:#}", course, e),
            }
        }

        if once {
            return Ok(());
        }
        info!("Next refresh in {}s", interval.as_secs());
        tokio::time::sleep(interval).await;
    }
}

/// Index status of one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseStatus {
    /// Course id
    pub course: String,
    /// `Ready` if the stored index can serve queries with the current embedder
    pub state: IndexState,
    /// Posts in the stored index
    pub posts: Option<usize>,
    /// Chunks in the stored index
    pub chunks: Option<usize>,
    /// Embedding model of the stored index
    pub embedding_model: Option<String>,
    /// Unix timestamp of the last rebuild
    pub built_at: Option<u64>,
    /// Whether `posts.json` changed since the last rebuild
    pub stale: Option<bool>,
}

/// Reads stored manifests without loading or building any index.
pub async fn course_status(
    data_dir: &Path,
    embedder: &dyn Embedder,
    courses: &[String],
) -> Result<Vec<CourseStatus>> {
    let registry = CourseRegistry::load(&config::registry_path(data_dir))?;
    let courses = selected_courses(&registry, courses)?;

    let mut statuses = Vec::with_capacity(courses.len());
    for course in courses {
        let db_path = config::index_path(data_dir, &course);
        let manifest = if db_path.exists() {
            let store = RedbIndexStore::open(&db_path)
                .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
            store.load_manifest().await?
        } else {
            None
        };

        let corpus_hash = Corpus::load(config::corpus_path(data_dir, &course))
            .ok()
            .map(|corpus| corpus.content_hash());

        let status = match manifest {
            Some(manifest) => CourseStatus {
                state: if manifest.is_compatible()
                    && manifest.embedding_model == embedder.model_id()
                    && manifest.embedding_dim == embedder.embedding_dim()
                {
                    IndexState::Ready
                } else {
                    IndexState::Absent
                },
                posts: Some(manifest.post_count),
                chunks: Some(manifest.chunk_count),
                stale: corpus_hash.map(|hash| hash != manifest.corpus_hash),
                built_at: Some(manifest.built_at),
                embedding_model: Some(manifest.embedding_model),
                course,
            },
            None => CourseStatus {
                course,
                state: IndexState::Absent,
                posts: None,
                chunks: None,
                embedding_model: None,
                built_at: None,
                stale: None,
            },
        };
        statuses.push(status);
    }
    Ok(statuses)
}

fn selected_courses(registry: &CourseRegistry, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(registry.courses().map(str::to_string).collect());
    }
    for course in requested {
        ensure_registered(registry, course)?;
    }
    Ok(requested.to_vec())
}
