//! Search command implementation.
//!
//! Opens the persisted index of a registered course and runs one query. The
//! search path never builds an index; `forumsearch rebuild` does that.

use crate::config;
use crate::registry::CourseRegistry;
use anyhow::{Context, Result};
use forumsearch_core::embedding::Embedder;
use forumsearch_core::storage::RedbIndexStore;
use forumsearch_core::{PostHit, RetrievalConfig, SearchError, SearchService};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Fails with `SearchError::NotFound` unless the course is registered.
pub fn ensure_registered(registry: &CourseRegistry, course: &str) -> Result<()> {
    config::validate_course_id(course)?;
    if registry.is_registered(course) {
        Ok(())
    } else {
        Err(anyhow::Error::new(SearchError::NotFound {
            corpus_id: course.to_string(),
        })
        .context(format!("Course '{}' is not registered", course)))
    }
}

/// Performs a search against the persisted index of a course.
///
/// This function:
/// 1. Checks the course registry
/// 2. Opens the course's index database
/// 3. Loads the snapshot (no embedding calls)
/// 4. Embeds the query and runs hybrid retrieval
///
/// # Errors
///
/// `SearchError::NotFound` (inside the `anyhow` chain) when the course is
/// unregistered or has no usable index.
pub async fn execute_search(
    data_dir: &Path,
    embedder: Arc<dyn Embedder>,
    retrieval: RetrievalConfig,
    course: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<PostHit>> {
    let registry = CourseRegistry::load(&config::registry_path(data_dir))?;
    ensure_registered(&registry, course)?;

    let db_path = config::index_path(data_dir, course);
    if !db_path.exists() {
        return Err(anyhow::Error::new(SearchError::NotFound {
            corpus_id: course.to_string(),
        })
        .context(format!("No index found at {}", db_path.display())));
    }

    info!("Opening database: {}", db_path.display());
    let store = RedbIndexStore::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    let service = SearchService::new(embedder, retrieval)?;
    service.attach(course, store);
    let state = service.open(course).await?;
    info!("Index for {} is {}", course, state);

    info!("Searching for: \"{}\"", query);
    let hits = service.search(course, query, limit).await?;
    info!("Found {} posts", hits.len());
    Ok(hits)
}
