//! Key-value persistence: RocksDB for deployments, an ordered map for tests
//!
//! All engine mutations go through [`WriteBatch`] so that one operation's
//! writes land together or not at all.

use crate::{
    config::StorageConfig,
    errors::{DiceError, DiceResult, StorageError},
};
use rocksdb::{Direction, IteratorMode, Options, DB};
use std::{
    collections::BTreeMap,
    ops::Bound,
    path::Path,
    sync::{Arc, RwLock},
};

/// A single staged mutation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

/// Ordered set of mutations applied atomically by [`KVStore::write`]
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

/// Key-value store with atomic batch writes and ordered prefix scans
pub trait KVStore: Send + Sync {
    fn get(&self, key: &[u8]) -> DiceResult<Option<Vec<u8>>>;

    /// Apply every operation in `batch`, or none of them
    fn write(&self, batch: WriteBatch) -> DiceResult<()>;

    /// Return up to `limit` entries whose key starts with `prefix`, in key
    /// order, beginning strictly after `start_after` when given.
    fn scan_prefix(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
    ) -> DiceResult<Vec<(Vec<u8>, Vec<u8>)>>;

    fn put(&self, key: &[u8], value: &[u8]) -> DiceResult<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(batch)
    }
}

impl<T: KVStore + ?Sized> KVStore for Arc<T> {
    fn get(&self, key: &[u8]) -> DiceResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn write(&self, batch: WriteBatch) -> DiceResult<()> {
        (**self).write(batch)
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
    ) -> DiceResult<Vec<(Vec<u8>, Vec<u8>)>> {
        (**self).scan_prefix(prefix, start_after, limit)
    }
}

/// RocksDB-backed store
#[derive(Clone)]
pub struct OptimizedStorage {
    db: Arc<DB>,
}

impl OptimizedStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rocksdb::Error> {
        Self::open(path, 64 * 1024 * 1024)
    }

    /// Open the database described by `config`, wiping it first if requested
    pub fn new_with_config(config: &StorageConfig) -> DiceResult<Self> {
        if config.clear_on_start && Path::new(&config.data_directory).exists() {
            tracing::warn!(path = %config.data_directory, "Clearing storage directory on start");
            std::fs::remove_dir_all(&config.data_directory)?;
        }

        Self::open(&config.data_directory, config.write_buffer_size).map_err(|e| {
            DiceError::Storage(StorageError::DatabaseOpenFailed(format!(
                "{}: {}",
                config.data_directory, e
            )))
        })
    }

    fn open<P: AsRef<Path>>(path: P, write_buffer_size: usize) -> Result<Self, rocksdb::Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(write_buffer_size);
        opts.set_max_write_buffer_number(4);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl KVStore for OptimizedStorage {
    fn get(&self, key: &[u8]) -> DiceResult<Option<Vec<u8>>> {
        self.db
            .get(key)
            .map_err(|e| DiceError::Storage(StorageError::ReadFailed(e.to_string())))
    }

    fn write(&self, batch: WriteBatch) -> DiceResult<()> {
        let mut rocks_batch = rocksdb::WriteBatch::default();
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => rocks_batch.put(key, value),
                BatchOp::Delete(key) => rocks_batch.delete(key),
            }
        }
        self.db
            .write(rocks_batch)
            .map_err(|e| DiceError::Storage(StorageError::WriteFailed(e.to_string())))
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
    ) -> DiceResult<Vec<(Vec<u8>, Vec<u8>)>> {
        // A cursor sorting before the prefix starts at the prefix
        let start = match start_after {
            Some(after) if after > prefix => after,
            _ => prefix,
        };
        let mut rows = Vec::with_capacity(limit.min(256));

        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) =
                item.map_err(|e| DiceError::Storage(StorageError::ReadFailed(e.to_string())))?;
            if !key.starts_with(prefix) {
                break;
            }
            if start_after.is_some_and(|after| key.as_ref() == after) {
                continue;
            }
            rows.push((key.to_vec(), value.to_vec()));
            if rows.len() >= limit {
                break;
            }
        }

        Ok(rows)
    }
}

/// Ordered in-memory store with the same semantics as [`OptimizedStorage`]
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KVStore for MemoryStorage {
    fn get(&self, key: &[u8]) -> DiceResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::ReadFailed("memory store lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, batch: WriteBatch) -> DiceResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::WriteFailed("memory store lock poisoned".to_string()))?;
        for op in batch.ops {
            match op {
                BatchOp::Put(key, value) => {
                    entries.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
    ) -> DiceResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::ReadFailed("memory store lock poisoned".to_string()))?;
        let lower = match start_after {
            Some(after) => Bound::Excluded(after.to_vec()),
            None => Bound::Included(prefix.to_vec()),
        };

        Ok(entries
            .range((lower, Bound::Unbounded))
            .skip_while(|(key, _)| key.as_slice() < prefix)
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(limit)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
