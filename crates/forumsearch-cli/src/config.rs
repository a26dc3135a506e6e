//! Configuration and path resolution for the CLI.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/
//!   courses.json          registered course ids
//!   <course>/posts.json   corpus written by the scraper
//!   <course>/index.redb   persisted index snapshot
//! ```

use anyhow::{anyhow, bail, Context, Result};
use directories::ProjectDirs;
use forumsearch_core::embedding::{
    Embedder, HashingEmbedder, OpenAiConfig, OpenAiEmbedder, DEFAULT_OPENAI_MODEL,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Corpus file written by the scraper
const CORPUS_FILENAME: &str = "posts.json";

/// Index database file
const INDEX_FILENAME: &str = "index.redb";

/// Course registry file
const REGISTRY_FILENAME: &str = "courses.json";

/// Environment variable for a custom data directory
const DATA_DIR_ENV: &str = "FORUMSEARCH_DATA_DIR";

/// Environment variable holding the OpenAI API key
const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the embedding model
const MODEL_ENV: &str = "FORUMSEARCH_EMBEDDING_MODEL";

/// Environment variable overriding the embeddings base URL
const BASE_URL_ENV: &str = "FORUMSEARCH_EMBEDDING_BASE_URL";

/// Returns the data directory.
///
/// Search order:
/// 1. `--data-dir`
/// 2. `$FORUMSEARCH_DATA_DIR`
/// 3. Platform data directory (e.g. `~/.local/share/forumsearch/` on Linux)
pub fn get_data_dir(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = custom_dir {
        return Ok(dir.clone());
    }
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    ProjectDirs::from("edu", "forumsearch", "forumsearch")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine data directory"))
}

/// Rejects course ids that could escape the data directory.
pub fn validate_course_id(course: &str) -> Result<()> {
    let valid = !course.is_empty()
        && course
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        bail!(
            "Invalid course id '{}': use letters, digits, '-' or '_'",
            course
        );
    }
    Ok(())
}

/// Returns the path to the course registry.
pub fn registry_path(data_dir: &Path) -> PathBuf {
    data_dir.join(REGISTRY_FILENAME)
}

/// Returns the path to a course's corpus file.
pub fn corpus_path(data_dir: &Path, course: &str) -> PathBuf {
    data_dir.join(course).join(CORPUS_FILENAME)
}

/// Returns the path to a course's index database.
pub fn index_path(data_dir: &Path, course: &str) -> PathBuf {
    data_dir.join(course).join(INDEX_FILENAME)
}

/// Selects the embedder from the process environment.
pub fn create_embedder(offline: bool) -> Result<Arc<dyn Embedder>> {
    embedder_from_lookup(offline, |key| std::env::var(key).ok())
}

/// Selects the embedder.
///
/// `--offline` uses the hashing embedder; otherwise an OpenAI-compatible
/// client is configured from `lookup`.
pub fn embedder_from_lookup(
    offline: bool,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn Embedder>> {
    if offline {
        return Ok(Arc::new(HashingEmbedder::default()));
    }

    let api_key = lookup(API_KEY_ENV)
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            anyhow!(
                "${} is not set. Set it, or pass --offline to use the local hashing embedder.",
                API_KEY_ENV
            )
        })?;

    let mut config = OpenAiConfig::new(api_key);
    config.model = lookup(MODEL_ENV).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
    if let Some(base_url) = lookup(BASE_URL_ENV) {
        config.base_url = base_url;
    }

    let embedder = OpenAiEmbedder::new(config).context("Failed to configure embedding client")?;
    Ok(Arc::new(embedder))
}
