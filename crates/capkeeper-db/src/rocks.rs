// RocksDB implementation
//
// This module provides a RocksDB implementation of the Database trait, which
// provides persistent storage using the RocksDB key-value store. RocksDB's
// default comparator orders keys bytewise, matching the in-memory backend.

use std::sync::Arc;

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};

use super::{BatchOp, Database, DbConfig, DbError, DbIterator, OpenDatabase, SnapshotIterator};

/// RocksDB implementation of the Database trait
#[derive(Debug, Clone)]
pub struct RocksDb {
    /// The internal RocksDB database instance
    db: Arc<DB>,
    /// The path to the database
    path: String,
}

impl RocksDb {
    /// The path this database was opened at
    pub fn path(&self) -> &str {
        &self.path
    }

    fn collect(&self, mode: IteratorMode<'_>, prefix: Option<&[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>, DbError> {
        let mut items = Vec::new();
        for result in self.db.iterator(mode) {
            let (key, value) = result.map_err(|e| {
                DbError::ReadError(format!("Failed to read next item from RocksDB: {}", e))
            })?;
            if let Some(prefix) = prefix {
                if !key.starts_with(prefix) {
                    break;
                }
            }
            items.push((key.to_vec(), value.to_vec()));
        }
        Ok(items)
    }
}

impl OpenDatabase for RocksDb {
    fn open(config: DbConfig) -> Result<Self, DbError> {
        let mut options = Options::default();
        options.create_if_missing(config.create_if_missing);

        let db = if config.read_only {
            DB::open_for_read_only(&options, &config.path, false)
                .map_err(|e| DbError::OpenError(format!("Failed to open RocksDB: {}", e)))?
        } else {
            DB::open(&options, &config.path)
                .map_err(|e| DbError::OpenError(format!("Failed to open RocksDB: {}", e)))?
        };

        tracing::debug!(path = %config.path, read_only = config.read_only, "opened rocksdb");

        Ok(Self {
            db: Arc::new(db),
            path: config.path,
        })
    }
}

impl Database for RocksDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError> {
        self.db.get(key)
            .map_err(|e| DbError::ReadError(format!("Failed to read from RocksDB: {}", e)))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DbError> {
        self.db.put(key, value)
            .map_err(|e| DbError::WriteError(format!("Failed to write to RocksDB: {}", e)))
    }

    fn delete(&self, key: &[u8]) -> Result<(), DbError> {
        self.db.delete(key)
            .map_err(|e| DbError::DeleteError(format!("Failed to delete from RocksDB: {}", e)))
    }

    fn contains(&self, key: &[u8]) -> Result<bool, DbError> {
        self.db.get(key)
            .map(|v| v.is_some())
            .map_err(|e| DbError::ReadError(format!("Failed to read from RocksDB: {}", e)))
    }

    fn write_batch(&self, batch: &[BatchOp]) -> Result<(), DbError> {
        let mut wb = WriteBatch::default();

        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    wb.put(key, value);
                },
                BatchOp::Delete(key) => {
                    wb.delete(key);
                },
            }
        }

        self.db.write(wb)
            .map_err(|e| DbError::WriteError(format!("Failed to write batch to RocksDB: {}", e)))
    }

    fn iterator(&self) -> Result<Box<dyn DbIterator>, DbError> {
        let items = self.collect(IteratorMode::Start, None)?;
        Ok(Box::new(SnapshotIterator::new(items)))
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Result<Box<dyn DbIterator>, DbError> {
        let items = self.collect(IteratorMode::From(prefix, Direction::Forward), Some(prefix))?;
        Ok(Box::new(SnapshotIterator::new(items)))
    }

    fn flush(&self) -> Result<(), DbError> {
        self.db.flush()
            .map_err(|e| DbError::WriteError(format!("Failed to flush RocksDB: {}", e)))
    }

    fn close(&self) -> Result<(), DbError> {
        // RocksDB will be closed when the last Arc<DB> is dropped
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rocksdb_basic() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().to_str().unwrap();

        let db = RocksDb::open(DbConfig::new(path)).unwrap();

        // Initially empty
        assert!(!db.contains(b"key1").unwrap());

        // Put and get
        db.put(b"key1", b"value1").unwrap();
        assert!(db.contains(b"key1").unwrap());
        assert_eq!(db.get(b"key1").unwrap(), Some(b"value1".to_vec()));

        // Delete
        db.delete(b"key1").unwrap();
        assert_eq!(db.get(b"key1").unwrap(), None);

        db.close().unwrap();
    }

    #[test]
    fn test_rocksdb_batch() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().to_str().unwrap();
        let db = RocksDb::open(DbConfig::new(path)).unwrap();

        let batch = vec![
            BatchOp::Put(b"key1".to_vec(), b"value1".to_vec()),
            BatchOp::Put(b"key2".to_vec(), b"value2".to_vec()),
            BatchOp::Put(b"key3".to_vec(), b"value3".to_vec()),
            BatchOp::Delete(b"key2".to_vec()),
        ];
        db.write_batch(&batch).unwrap();

        assert_eq!(db.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(db.get(b"key2").unwrap(), None);
        assert_eq!(db.get(b"key3").unwrap(), Some(b"value3".to_vec()));
    }

    #[test]
    fn test_rocksdb_prefix_iterator_is_ordered() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().to_str().unwrap();
        let db = RocksDb::open(DbConfig::new(path)).unwrap();

        db.put(b"aaa2", b"value2").unwrap();
        db.put(b"aaa1", b"value1").unwrap();
        db.put(b"bbb1", b"value3").unwrap();

        let mut iter = db.prefix_iterator(b"aaa").unwrap();
        let mut items = Vec::new();
        while let Some(item) = iter.next() {
            items.push(item.unwrap());
        }

        assert_eq!(
            items,
            vec![
                (b"aaa1".to_vec(), b"value1".to_vec()),
                (b"aaa2".to_vec(), b"value2".to_vec()),
            ]
        );
    }

    #[test]
    fn test_rocksdb_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().to_str().unwrap().to_string();

        {
            let db = RocksDb::open(DbConfig::new(&path)).unwrap();
            db.put(b"index", &2u64.to_be_bytes()).unwrap();
            db.flush().unwrap();
        }

        let db = RocksDb::open(DbConfig::new(&path)).unwrap();
        assert_eq!(db.get(b"index").unwrap(), Some(2u64.to_be_bytes().to_vec()));
    }
}
