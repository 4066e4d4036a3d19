// Snapshot iterator
//
// Iterator over a materialized, sorted copy of a key range. Backends and
// layers that cannot hand out a live cursor collect the range up front and
// return one of these.

use super::{DbError, DbIterator};

/// Iterator over a sorted snapshot of key-value pairs
pub struct SnapshotIterator {
    /// All key-value pairs, sorted by key
    items: Vec<(Vec<u8>, Vec<u8>)>,
    /// Current position in the iterator
    position: usize,
}

impl SnapshotIterator {
    /// Create a new iterator; `items` must already be sorted by key
    pub fn new(items: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        debug_assert!(items.windows(2).all(|w| w[0].0 < w[1].0));
        Self { items, position: 0 }
    }
}

impl DbIterator for SnapshotIterator {
    fn next(&mut self) -> Option<Result<(Vec<u8>, Vec<u8>), DbError>> {
        let item = self.items.get(self.position)?.clone();
        self.position += 1;
        Some(Ok(item))
    }

    fn seek(&mut self, key: &[u8]) -> Result<(), DbError> {
        self.position = self.items.partition_point(|(k, _)| k.as_slice() < key);
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<(), DbError> {
        self.position = 0;
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<(), DbError> {
        self.position = self.items.len().saturating_sub(1);
        Ok(())
    }
}
