// Memory database implementation
//
// This module provides an in-memory database implementation for testing and
// for running a node without persistence. Keys are kept in a BTreeMap so
// iteration follows the same byte order a disk backend would produce.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use super::{prefix_end, BatchOp, Database, DbConfig, DbError, DbIterator, OpenDatabase, SnapshotIterator};

/// In-memory database implementation
///
/// Clones share the same underlying data, which lets tests keep a handle on
/// the durable state while the registry on top of it is torn down and rebuilt.
#[derive(Clone, Default)]
pub struct MemoryDb {
    /// The in-memory key-value store
    data: Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>,
    /// Whether the database is closed
    closed: Arc<RwLock<bool>>,
}

impl MemoryDb {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> Result<usize, DbError> {
        let data = self.data.read().map_err(|e| {
            DbError::ReadError(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(data.len())
    }

    /// Whether the database holds no keys
    pub fn is_empty(&self) -> Result<bool, DbError> {
        Ok(self.len()? == 0)
    }

    /// Check if the database is closed
    fn check_closed(&self) -> Result<(), DbError> {
        let closed = self.closed.read().map_err(|e| {
            DbError::GenericError(format!("Failed to acquire read lock: {}", e))
        })?;

        if *closed {
            return Err(DbError::GenericError("Database is closed".to_string()));
        }

        Ok(())
    }

    fn collect_range(&self, start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DbError> {
        let data = self.data.read().map_err(|e| {
            DbError::ReadError(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data
            .range((start, end))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

impl OpenDatabase for MemoryDb {
    fn open(_config: DbConfig) -> Result<Self, DbError> {
        Ok(Self::new())
    }
}

impl Database for MemoryDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError> {
        self.check_closed()?;

        let data = self.data.read().map_err(|e| {
            DbError::ReadError(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DbError> {
        self.check_closed()?;

        let mut data = self.data.write().map_err(|e| {
            DbError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;

        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), DbError> {
        self.check_closed()?;

        let mut data = self.data.write().map_err(|e| {
            DbError::DeleteError(format!("Failed to acquire write lock: {}", e))
        })?;

        data.remove(key);
        Ok(())
    }

    fn contains(&self, key: &[u8]) -> Result<bool, DbError> {
        self.check_closed()?;

        let data = self.data.read().map_err(|e| {
            DbError::ReadError(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.contains_key(key))
    }

    fn write_batch(&self, batch: &[BatchOp]) -> Result<(), DbError> {
        self.check_closed()?;

        let mut data = self.data.write().map_err(|e| {
            DbError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;

        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    data.insert(key.clone(), value.clone());
                },
                BatchOp::Delete(key) => {
                    data.remove(key);
                },
            }
        }

        Ok(())
    }

    fn iterator(&self) -> Result<Box<dyn DbIterator>, DbError> {
        self.check_closed()?;
        let items = self.collect_range(Bound::Unbounded, Bound::Unbounded)?;
        Ok(Box::new(SnapshotIterator::new(items)))
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Result<Box<dyn DbIterator>, DbError> {
        self.check_closed()?;
        let end = match prefix_end(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let items = self.collect_range(Bound::Included(prefix.to_vec()), end)?;
        Ok(Box::new(SnapshotIterator::new(items)))
    }

    fn flush(&self) -> Result<(), DbError> {
        // Nothing to do for in-memory database
        Ok(())
    }

    fn close(&self) -> Result<(), DbError> {
        let mut closed = self.closed.write().map_err(|e| {
            DbError::GenericError(format!("Failed to acquire write lock: {}", e))
        })?;

        *closed = true;
        Ok(())
    }
}
