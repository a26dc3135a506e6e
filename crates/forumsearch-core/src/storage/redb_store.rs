//! Redb-backed index store.
//!
//! Uses [redb](https://github.com/cberner/redb) - a pure Rust, ACID-compliant,
//! embedded B-tree database. A snapshot replacement is one write transaction,
//! so a crash mid-rebuild leaves the previous snapshot readable.
//!
//! # Tables
//!
//! - `chunks`: ChunkId (u64) -> ChunkRecord (JSON)
//! - `embeddings`: ChunkId (u64) -> `Vec<f32>` (raw bytes, little-endian)
//! - `meta`: key (string) -> value (JSON); `manifest` and `corpus`

use super::{IndexStore, PersistedIndex, StoreError};
use crate::corpus::Corpus;
use crate::search::{ChunkRecord, IndexManifest};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, instrument};

const CHUNKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const EMBEDDINGS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("embeddings");
const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

// Meta keys
const MANIFEST_KEY: &str = "manifest";
const CORPUS_KEY: &str = "corpus";

/// Redb-backed store for one corpus snapshot.
///
/// # Example
///
/// ```no_run
/// use forumsearch_core::storage::RedbIndexStore;
///
/// let store = RedbIndexStore::open("./data/cs101/index.redb")?;
/// # Ok::<(), forumsearch_core::storage::StoreError>(())
/// ```
pub struct RedbIndexStore {
    db: Arc<Database>,
}

fn db_err<E: std::fmt::Display>(context: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::DatabaseError(format!("{}: {}", context, e))
}

impl RedbIndexStore {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates the parent directory, the database file, and all tables if
    /// they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::IoError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let db = Database::create(path.as_ref()).map_err(db_err("Failed to open database"))?;

        {
            let write_txn = db
                .begin_write()
                .map_err(db_err("Failed to begin write transaction"))?;
            write_txn
                .open_table(CHUNKS_TABLE)
                .map_err(db_err("Failed to create chunks table"))?;
            write_txn
                .open_table(EMBEDDINGS_TABLE)
                .map_err(db_err("Failed to create embeddings table"))?;
            write_txn
                .open_table(META_TABLE)
                .map_err(db_err("Failed to create meta table"))?;
            write_txn
                .commit()
                .map_err(db_err("Failed to commit table creation"))?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize {}: {}", what, e))
        })
    }

    fn from_json<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| {
            StoreError::SerializationError(format!("Failed to deserialize {}: {}", what, e))
        })
    }

    /// Serializes an embedding to raw bytes.
    ///
    /// Format: Little-endian f32 values packed sequentially (4 bytes per value).
    /// Endianness MUST match `deserialize_embedding()`.
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(embedding.len() * 4);
        for &val in embedding {
            bytes.extend_from_slice(&val.to_le_bytes());
        }
        bytes
    }

    /// Deserializes an embedding from raw bytes.
    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn read_meta<T: DeserializeOwned>(
        table: &redb::ReadOnlyTable<&'static str, &'static [u8]>,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        match table.get(key).map_err(db_err("Failed to read meta"))? {
            Some(guard) => Ok(Some(Self::from_json(guard.value(), key)?)),
            None => Ok(None),
        }
    }

    /// Reads every value of a u64-keyed table, checking keys are 0..n.
    fn read_dense<T>(
        table: &redb::ReadOnlyTable<u64, &'static [u8]>,
        table_name: &str,
        mut decode: impl FnMut(&[u8]) -> Result<T, StoreError>,
    ) -> Result<Vec<T>, StoreError> {
        let mut values = Vec::new();
        for entry in table.iter().map_err(db_err("Failed to iterate table"))? {
            let (key, value) = entry.map_err(db_err("Failed to read table entry"))?;
            if key.value() != values.len() as u64 {
                return Err(StoreError::Corrupt(format!(
                    "{} table has a gap at id {}",
                    table_name,
                    values.len()
                )));
            }
            values.push(decode(value.value())?);
        }
        Ok(values)
    }
}

fn clear_u64_table(
    write_txn: &redb::WriteTransaction,
    table_def: TableDefinition<'static, u64, &'static [u8]>,
) -> Result<(), StoreError> {
    let mut table = write_txn
        .open_table(table_def)
        .map_err(db_err("Failed to open table"))?;
    let keys: Vec<u64> = table
        .iter()
        .map_err(db_err("Failed to iterate table"))?
        .map(|entry| entry.map(|(key, _)| key.value()))
        .collect::<Result<_, _>>()
        .map_err(db_err("Failed to read table entry"))?;
    for key in keys {
        table.remove(key).map_err(db_err("Failed to remove entry"))?;
    }
    Ok(())
}

fn clear_meta(write_txn: &redb::WriteTransaction) -> Result<(), StoreError> {
    let mut table = write_txn
        .open_table(META_TABLE)
        .map_err(db_err("Failed to open meta table"))?;
    for key in [MANIFEST_KEY, CORPUS_KEY] {
        table.remove(key).map_err(db_err("Failed to remove meta entry"))?;
    }
    Ok(())
}

#[async_trait::async_trait(?Send)]
impl IndexStore for RedbIndexStore {
    #[instrument(skip_all)]
    async fn load_index(&self) -> Result<Option<PersistedIndex>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;

        let meta = read_txn
            .open_table(META_TABLE)
            .map_err(db_err("Failed to open meta table"))?;
        let Some(manifest) = Self::read_meta::<IndexManifest>(&meta, MANIFEST_KEY)? else {
            return Ok(None);
        };
        let corpus: Corpus = Self::read_meta(&meta, CORPUS_KEY)?
            .ok_or_else(|| StoreError::Corrupt("manifest without corpus".to_string()))?;

        let chunks_table = read_txn
            .open_table(CHUNKS_TABLE)
            .map_err(db_err("Failed to open chunks table"))?;
        let chunks: Vec<ChunkRecord> =
            Self::read_dense(&chunks_table, "chunks", |bytes| Self::from_json(bytes, "chunk"))?;

        let embeddings_table = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(db_err("Failed to open embeddings table"))?;
        let embeddings = Self::read_dense(&embeddings_table, "embeddings", |bytes| {
            Ok(Self::deserialize_embedding(bytes))
        })?;

        let index = PersistedIndex {
            manifest,
            corpus,
            chunks,
            embeddings,
        };
        index.validate()?;
        debug!("Loaded snapshot with {} chunks", index.chunks.len());
        Ok(Some(index))
    }

    async fn load_manifest(&self) -> Result<Option<IndexManifest>, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let meta = read_txn
            .open_table(META_TABLE)
            .map_err(db_err("Failed to open meta table"))?;
        Self::read_meta(&meta, MANIFEST_KEY)
    }

    #[instrument(skip_all, fields(chunks = index.chunks.len()))]
    async fn replace_index(&self, index: &PersistedIndex) -> Result<(), StoreError> {
        index.validate()?;
        let manifest_bytes = Self::to_json(&index.manifest, "manifest")?;
        let corpus_bytes = Self::to_json(&index.corpus, "corpus")?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;

        clear_u64_table(&write_txn, CHUNKS_TABLE)?;
        clear_u64_table(&write_txn, EMBEDDINGS_TABLE)?;

        {
            let mut chunks = write_txn
                .open_table(CHUNKS_TABLE)
                .map_err(db_err("Failed to open chunks table"))?;
            let mut embeddings = write_txn
                .open_table(EMBEDDINGS_TABLE)
                .map_err(db_err("Failed to open embeddings table"))?;

            for (id, (chunk, embedding)) in index.chunks.iter().zip(&index.embeddings).enumerate()
            {
                let chunk_bytes = Self::to_json(chunk, "chunk")?;
                chunks
                    .insert(id as u64, chunk_bytes.as_slice())
                    .map_err(db_err("Failed to insert chunk"))?;
                let embedding_bytes = Self::serialize_embedding(embedding);
                embeddings
                    .insert(id as u64, embedding_bytes.as_slice())
                    .map_err(db_err("Failed to insert embedding"))?;
            }

            let mut meta = write_txn
                .open_table(META_TABLE)
                .map_err(db_err("Failed to open meta table"))?;
            meta.insert(MANIFEST_KEY, manifest_bytes.as_slice())
                .map_err(db_err("Failed to insert manifest"))?;
            meta.insert(CORPUS_KEY, corpus_bytes.as_slice())
                .map_err(db_err("Failed to insert corpus"))?;
        }

        write_txn
            .commit()
            .map_err(db_err("Failed to commit snapshot"))?;
        Ok(())
    }

    async fn chunk_count(&self) -> Result<usize, StoreError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(db_err("Failed to begin read transaction"))?;
        let table = read_txn
            .open_table(CHUNKS_TABLE)
            .map_err(db_err("Failed to open chunks table"))?;
        let count = table.len().map_err(db_err("Failed to get chunk count"))?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let write_txn = self
            .db
            .begin_write()
            .map_err(db_err("Failed to begin write transaction"))?;
        clear_u64_table(&write_txn, CHUNKS_TABLE)?;
        clear_u64_table(&write_txn, EMBEDDINGS_TABLE)?;
        clear_meta(&write_txn)?;
        write_txn.commit().map_err(db_err("Failed to commit clear"))?;
        Ok(())
    }
}
