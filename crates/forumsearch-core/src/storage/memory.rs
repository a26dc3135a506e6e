//! Volatile index store.

use super::{IndexStore, PersistedIndex, StoreError};
use crate::search::IndexManifest;
use std::sync::{Arc, RwLock};

/// Keeps the snapshot in memory.
///
/// Clones share the same slot, so a test can hand one clone to the service
/// and inspect what was written through another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndexStore {
    index: Arc<RwLock<Option<PersistedIndex>>>,
}

impl InMemoryIndexStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with a snapshot.
    pub fn with_index(index: PersistedIndex) -> Self {
        Self {
            index: Arc::new(RwLock::new(Some(index))),
        }
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::DatabaseError(format!("Lock poisoned: {}", e))
}

#[async_trait::async_trait(?Send)]
impl IndexStore for InMemoryIndexStore {
    async fn load_index(&self) -> Result<Option<PersistedIndex>, StoreError> {
        let index = self.index.read().map_err(poisoned)?;
        Ok(index.clone())
    }

    async fn load_manifest(&self) -> Result<Option<IndexManifest>, StoreError> {
        let index = self.index.read().map_err(poisoned)?;
        Ok(index.as_ref().map(|i| i.manifest.clone()))
    }

    async fn replace_index(&self, new_index: &PersistedIndex) -> Result<(), StoreError> {
        new_index.validate()?;
        let mut index = self.index.write().map_err(poisoned)?;
        *index = Some(new_index.clone());
        Ok(())
    }

    async fn chunk_count(&self) -> Result<usize, StoreError> {
        let index = self.index.read().map_err(poisoned)?;
        Ok(index.as_ref().map_or(0, |i| i.chunks.len()))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut index = self.index.write().map_err(poisoned)?;
        *index = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::sample_index;

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryIndexStore::new();
        assert!(store.load_index().await.unwrap().is_none());
        assert!(store.load_manifest().await.unwrap().is_none());
        assert_eq!(store.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_and_load() {
        let store = InMemoryIndexStore::new();
        let index = sample_index();
        store.replace_index(&index).await.unwrap();

        assert_eq!(store.load_index().await.unwrap(), Some(index.clone()));
        assert_eq!(store.load_manifest().await.unwrap(), Some(index.manifest));
        assert_eq!(store.chunk_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryIndexStore::new();
        let observer = store.clone();
        store.replace_index(&sample_index()).await.unwrap();
        assert_eq!(observer.chunk_count().await.unwrap(), 3);

        observer.clear().await.unwrap();
        assert!(store.load_index().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_snapshot_rejected_and_previous_kept() {
        let store = InMemoryIndexStore::with_index(sample_index());
        let mut broken = sample_index();
        broken.chunks.pop();

        assert!(store.replace_index(&broken).await.is_err());
        assert_eq!(store.chunk_count().await.unwrap(), 3);
    }
}
