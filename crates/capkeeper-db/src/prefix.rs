// Prefixed database view
//
// Gives one module its own key namespace inside a shared database. Every key
// is transparently prefixed on the way in and stripped on the way out.

use std::sync::Arc;

use super::{BatchOp, Database, DbError, DbIterator, SnapshotIterator};

/// Namespaced view over a parent database
#[derive(Clone)]
pub struct PrefixDb {
    parent: Arc<dyn Database>,
    prefix: Vec<u8>,
}

impl PrefixDb {
    /// Create a view of `parent` restricted to keys starting with `prefix`
    pub fn new(parent: Arc<dyn Database>, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            parent,
            prefix: prefix.into(),
        }
    }

    /// The namespace prefix
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }

    fn strip(&self, mut iter: Box<dyn DbIterator>) -> Result<Box<dyn DbIterator>, DbError> {
        let mut items = Vec::new();
        while let Some(item) = iter.next() {
            let (key, value) = item?;
            let stripped = key
                .strip_prefix(self.prefix.as_slice())
                .ok_or_else(|| DbError::ReadError("iterator escaped its prefix".to_string()))?
                .to_vec();
            items.push((stripped, value));
        }
        Ok(Box::new(SnapshotIterator::new(items)))
    }
}

impl Database for PrefixDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, DbError> {
        self.parent.get(&self.key(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), DbError> {
        self.parent.put(&self.key(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), DbError> {
        self.parent.delete(&self.key(key))
    }

    fn contains(&self, key: &[u8]) -> Result<bool, DbError> {
        self.parent.contains(&self.key(key))
    }

    fn write_batch(&self, batch: &[BatchOp]) -> Result<(), DbError> {
        let prefixed: Vec<BatchOp> = batch
            .iter()
            .map(|op| match op {
                BatchOp::Put(key, value) => BatchOp::Put(self.key(key), value.clone()),
                BatchOp::Delete(key) => BatchOp::Delete(self.key(key)),
            })
            .collect();
        self.parent.write_batch(&prefixed)
    }

    fn iterator(&self) -> Result<Box<dyn DbIterator>, DbError> {
        self.strip(self.parent.prefix_iterator(&self.prefix)?)
    }

    fn prefix_iterator(&self, prefix: &[u8]) -> Result<Box<dyn DbIterator>, DbError> {
        self.strip(self.parent.prefix_iterator(&self.key(prefix))?)
    }

    fn flush(&self) -> Result<(), DbError> {
        self.parent.flush()
    }

    fn close(&self) -> Result<(), DbError> {
        // The parent is shared with other namespaces
        Ok(())
    }
}
