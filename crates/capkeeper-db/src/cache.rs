// Cache database layer
//
// `CacheDb` buffers every write of one unit of work (a transaction or a
// block) on top of a parent database. Reads see the buffered writes first and
// fall back to the parent. Nothing reaches the parent until `commit`, which
// applies the whole buffer as a single atomic batch; dropping or discarding
// the layer rolls the unit of work back.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use super::{prefix_end, BatchOp, Database, DbError, DbIterator, SnapshotIterator};

/// Buffered writes: `Some` is a put, `None` a delete
type Writes = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Write-buffering layer over a parent database
pub struct CacheDb {
    parent: Arc<dyn Database>,
    writes: RwLock<Writes>,
}

impl CacheDb {
    /// Create an empty layer over `parent`
    pub fn new(parent: Arc<dyn Database>) -> Self {
        Self {
            parent,
            writes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of buffered operations
    pub fn pending(&self) -> Result<usize, DbError> {
        Ok(self.read_writes()?.len())
    }

    /// Apply all buffered writes to the parent as one batch and clear the buffer
    pub fn commit(&self) -> Result<(), DbError> {
        let mut writes = self.writes.write().map_err(|e| {
            DbError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;

        let batch: Vec<BatchOp> = writes
            .iter()
            .map(|(key, value)| match value {
                Some(value) => BatchOp::Put(key.clone(), value.clone()),
                None => BatchOp::Delete(key.clone()),
            })
            .collect();

        self.parent.write_batch(&batch)?;
        writes.clear();
        tracing::trace!(ops = batch.len(), "committed cache layer");
        Ok(())
    }

    /// Drop all buffered writes
    pub fn discard(&self) -> Result<(), DbError> {
        let mut writes = self.writes.write().map_err(|e| {
            DbError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;
        writes.clear();
        Ok(())
    }

    fn read_writes(&self) -> Result<std::sync::RwLockReadGuard<'_, Writes>, DbError> {
        self.writes.read().map_err(|e| {
            DbError::ReadError(format!("Failed to acquire read lock: {}", e))
        })
    }

    /// Merge the parent's entries in `[start, end)` with the buffered writes
    fn merged(&self, mut parent_iter: Box<dyn DbIterator>, start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DbError> {
        let mut merged = BTreeMap::new();
        while let Some(item) = parent_iter.next() {
            let (key, value) = item?;
            merged.insert(key, value);
        }

        let writes = self.read_writes()?;
        for (key, value) in writes.range((start, end)) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                },
                None => {
                    merged.remove(key);
                },
            }
        }

        Ok(merged.into_iter().collect())
    }

    fn buffer(&self, key: &[u8], value: Option<Vec<u8>>) -> Result<(), DbError> {
        let mut writes = self.writes.write().map_err(|e| {
            DbError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;
        writes.insert(key.to_vec(), value);
        Ok(())
    }
}

impl Database for CacheDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError> {
        if let Some(buffered) = self.read_writes()?.get(key) {
            return Ok(buffered.clone());
        }
        self.parent.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DbError> {
        self.buffer(key, Some(value.to_vec()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), DbError> {
        self.buffer(key, None)
    }

    fn contains(&self, key: &[u8]) -> Result<bool, DbError> {
        Ok(self.get(key)?.is_some())
    }

    fn write_batch(&self, batch: &[BatchOp]) -> Result<(), DbError> {
        let mut writes = self.writes.write().map_err(|e| {
            DbError::WriteError(format!("Failed to acquire write lock: {}", e))
        })?;

        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    writes.insert(key.clone(), Some(value.clone()));
                },
                BatchOp::Delete(key) => {
                    writes.insert(key.clone(), None);
                },
            }
        }

        Ok(())
    }

    fn iterator(&self) -> Result<Box<dyn DbIterator>, DbError> {
        let items = self.merged(self.parent.iterator()?, Bound::Unbounded, Bound::Unbounded)?;
        Ok(Box::new(SnapshotIterator::new(items)))
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Result<Box<dyn DbIterator>, DbError> {
        let end = match prefix_end(prefix) {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let items = self.merged(
            self.parent.prefix_iterator(prefix)?,
            Bound::Included(prefix.to_vec()),
            end,
        )?;
        Ok(Box::new(SnapshotIterator::new(items)))
    }

    fn flush(&self) -> Result<(), DbError> {
        // Buffered writes only leave through `commit`
        Ok(())
    }

    fn close(&self) -> Result<(), DbError> {
        self.discard()
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::MemoryDb;

    fn drain(mut iter: Box<dyn DbIterator>) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut items = Vec::new();
        while let Some(item) = iter.next() {
            items.push(item.unwrap());
        }
        items
    }

    #[test]
    fn test_reads_see_buffered_writes() {
        let parent = MemoryDb::new();
        parent.put(b"a", b"1").unwrap();
        parent.put(b"b", b"2").unwrap();

        let cache = CacheDb::new(Arc::new(parent.clone()));
        cache.put(b"a", b"10").unwrap();
        cache.delete(b"b").unwrap();
        cache.put(b"c", b"3").unwrap();

        assert_eq!(cache.get(b"a").unwrap(), Some(b"10".to_vec()));
        assert_eq!(cache.get(b"b").unwrap(), None);
        assert!(cache.contains(b"c").unwrap());

        // Parent is untouched until commit
        assert_eq!(parent.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(parent.get(b"c").unwrap(), None);
    }

    #[test]
    fn test_commit_applies_batch() {
        let parent = MemoryDb::new();
        parent.put(b"b", b"2").unwrap();

        let cache = CacheDb::new(Arc::new(parent.clone()));
        cache.put(b"a", b"1").unwrap();
        cache.delete(b"b").unwrap();
        assert_eq!(cache.pending().unwrap(), 2);

        cache.commit().unwrap();
        assert_eq!(cache.pending().unwrap(), 0);
        assert_eq!(parent.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(parent.get(b"b").unwrap(), None);
    }

    #[test]
    fn test_discard_rolls_back() {
        let parent = MemoryDb::new();
        let cache = CacheDb::new(Arc::new(parent.clone()));
        cache.put(b"a", b"1").unwrap();
        cache.discard().unwrap();

        assert_eq!(cache.get(b"a").unwrap(), None);
        cache.commit().unwrap();
        assert!(parent.is_empty().unwrap());
    }

    #[test]
    fn test_prefix_iterator_merges_in_order() {
        let parent = MemoryDb::new();
        parent.put(b"p1", b"parent").unwrap();
        parent.put(b"p3", b"parent").unwrap();
        parent.put(b"q1", b"other").unwrap();

        let cache = CacheDb::new(Arc::new(parent));
        cache.put(b"p2", b"cache").unwrap();
        cache.delete(b"p3").unwrap();
        cache.put(b"q2", b"other").unwrap();

        let items = drain(cache.prefix_iterator(b"p").unwrap());
        assert_eq!(
            items,
            vec![
                (b"p1".to_vec(), b"parent".to_vec()),
                (b"p2".to_vec(), b"cache".to_vec()),
            ]
        );
    }

    #[test]
    fn test_nested_layers() {
        let root = MemoryDb::new();
        let outer = Arc::new(CacheDb::new(Arc::new(root.clone())));
        let inner = CacheDb::new(outer.clone());

        inner.put(b"k", b"v").unwrap();
        inner.commit().unwrap();
        assert_eq!(outer.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(root.get(b"k").unwrap(), None);

        outer.commit().unwrap();
        assert_eq!(root.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
