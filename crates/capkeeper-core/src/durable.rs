// Durable capability index
//
// Typed access to the forward records, reverse records and index counter kept
// in the keeper's store-key namespace. Every access goes through the
// context's metered view, so whether an access is charged is decided by the
// context the index was opened on, never here.

use borsh::BorshDeserialize;
use tracing::trace;

use capkeeper_error::{CapabilityResult, StorageError};

use crate::context::{Context, GasKv};
use crate::keys::{
    fwd_capability_key, index_from_key, index_to_key, rev_capability_key, KEY_INDEX,
    KEY_PREFIX_INDEX_CAPABILITY,
};
use crate::types::{CapabilityIndex, CapabilityOwners};

/// Durable index of one keeper, opened on a context
pub struct DurableIndex {
    kv: GasKv,
}

impl DurableIndex {
    pub fn new(kv: GasKv) -> Self {
        Self { kv }
    }

    /// Open the index stored under `store_key` in `ctx`
    pub fn open(ctx: &Context, store_key: &str) -> Self {
        Self::new(ctx.kv_store(store_key))
    }

    /// The next index to allocate; 0 if no counter has been written
    pub fn latest_index(&self) -> CapabilityResult<CapabilityIndex> {
        match self.kv.get(KEY_INDEX)? {
            Some(bytes) => decode_index(&bytes, "index counter"),
            None => Ok(0),
        }
    }

    /// Whether an index counter has been written
    pub fn has_index(&self) -> CapabilityResult<bool> {
        self.kv.has(KEY_INDEX)
    }

    pub fn set_index(&self, index: CapabilityIndex) -> CapabilityResult<()> {
        self.kv.set(KEY_INDEX, &index_to_key(index))
    }

    /// Take the next index and advance the counter
    pub fn allocate_index(&self) -> CapabilityResult<CapabilityIndex> {
        let index = self.latest_index()?;
        let next = index
            .checked_add(1)
            .ok_or_else(|| StorageError::Corruption("capability index counter exhausted".to_string()))?;
        self.set_index(next)?;
        trace!(index, "allocated capability index");
        Ok(index)
    }

    pub fn get_owners(&self, index: CapabilityIndex) -> CapabilityResult<Option<CapabilityOwners>> {
        match self.kv.get(&fwd_capability_key(index))? {
            Some(bytes) => decode_owners(index, &bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn has_owners(&self, index: CapabilityIndex) -> CapabilityResult<bool> {
        self.kv.has(&fwd_capability_key(index))
    }

    pub fn put_owners(&self, index: CapabilityIndex, owners: &CapabilityOwners) -> CapabilityResult<()> {
        let bytes = borsh::to_vec(owners).map_err(|e| StorageError::Codec(e.to_string()))?;
        self.kv.set(&fwd_capability_key(index), &bytes)
    }

    pub fn delete_owners(&self, index: CapabilityIndex) -> CapabilityResult<()> {
        self.kv.delete(&fwd_capability_key(index))
    }

    /// Index that `(owner, name)` maps to, if any
    pub fn get_reverse(&self, owner: &str, name: &str) -> CapabilityResult<Option<CapabilityIndex>> {
        match self.kv.get(&rev_capability_key(owner, name)?)? {
            Some(bytes) => decode_index(&bytes, "reverse record").map(Some),
            None => Ok(None),
        }
    }

    pub fn put_reverse(&self, owner: &str, name: &str, index: CapabilityIndex) -> CapabilityResult<()> {
        self.kv.set(&rev_capability_key(owner, name)?, &index_to_key(index))
    }

    pub fn delete_reverse(&self, owner: &str, name: &str) -> CapabilityResult<()> {
        self.kv.delete(&rev_capability_key(owner, name)?)
    }

    /// Every forward record in ascending index order
    pub fn iterate_owners(&self) -> CapabilityResult<Vec<(CapabilityIndex, CapabilityOwners)>> {
        self.kv
            .prefix_scan(KEY_PREFIX_INDEX_CAPABILITY)?
            .into_iter()
            .map(|(key, value)| -> CapabilityResult<(CapabilityIndex, CapabilityOwners)> {
                let index = index_from_key(&key).ok_or_else(|| {
                    StorageError::Corruption(format!("malformed forward key of {} bytes", key.len()))
                })?;
                Ok((index, decode_owners(index, &value)?))
            })
            .collect()
    }
}

fn decode_index(bytes: &[u8], what: &str) -> CapabilityResult<CapabilityIndex> {
    index_from_key(bytes)
        .ok_or_else(|| StorageError::Corruption(format!("{what} is {} bytes, expected 8", bytes.len())).into())
}

fn decode_owners(index: CapabilityIndex, bytes: &[u8]) -> CapabilityResult<CapabilityOwners> {
    let owners = CapabilityOwners::try_from_slice(bytes)
        .map_err(|e| StorageError::Codec(format!("owners of index {index}: {e}")))?;
    if owners.is_empty() || !owners.is_canonical() {
        return Err(StorageError::Corruption(format!("owners of index {index} are not a canonical non-empty set")).into());
    }
    Ok(owners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use capkeeper_db::{Database, MemoryDb};
    use capkeeper_error::CapabilityError;

    use crate::types::Owner;

    fn open() -> (MemoryDb, DurableIndex) {
        let db = MemoryDb::new();
        let ctx = Context::new(Arc::new(db.clone()));
        (db, DurableIndex::open(&ctx, "capability"))
    }

    fn raw_key(key: &[u8]) -> Vec<u8> {
        let mut raw = b"capability/".to_vec();
        raw.extend_from_slice(key);
        raw
    }

    #[test]
    fn test_allocate_starts_at_zero() {
        let (_, index) = open();
        assert!(!index.has_index().unwrap());
        assert_eq!(index.allocate_index().unwrap(), 0);
        assert_eq!(index.allocate_index().unwrap(), 1);
        assert_eq!(index.latest_index().unwrap(), 2);
    }

    #[test]
    fn test_owner_records() {
        let (_, index) = open();
        let owners = CapabilityOwners::single(Owner::new("bank", "transfer"));
        index.put_owners(7, &owners).unwrap();
        index.put_reverse("bank", "transfer", 7).unwrap();

        assert_eq!(index.get_owners(7).unwrap(), Some(owners));
        assert_eq!(index.get_reverse("bank", "transfer").unwrap(), Some(7));

        index.delete_owners(7).unwrap();
        index.delete_reverse("bank", "transfer").unwrap();
        assert!(!index.has_owners(7).unwrap());
        assert_eq!(index.get_reverse("bank", "transfer").unwrap(), None);
    }

    #[test]
    fn test_iterate_in_index_order() {
        let (_, index) = open();
        for i in [300u64, 2, 256] {
            index
                .put_owners(i, &CapabilityOwners::single(Owner::new("m", format!("c{i}"))))
                .unwrap();
        }
        let indices: Vec<u64> = index.iterate_owners().unwrap().into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![2, 256, 300]);
    }

    #[test]
    fn test_corrupt_records_are_fatal() {
        let (db, index) = open();
        db.put(b"capability/index", b"xyz").unwrap();
        let err = index.latest_index().unwrap_err();
        assert!(matches!(err, CapabilityError::Storage(StorageError::Corruption(_))));

        db.put(&raw_key(&fwd_capability_key(1)), b"\xff").unwrap();
        let err = index.get_owners(1).unwrap_err();
        assert!(matches!(err, CapabilityError::Storage(StorageError::Codec(_))));
    }

    #[test]
    fn test_empty_owner_set_is_corruption() {
        let (db, index) = open();
        let empty = borsh::to_vec(&CapabilityOwners::new()).unwrap();
        db.put(&raw_key(&fwd_capability_key(1)), &empty).unwrap();
        let err = index.iterate_owners().unwrap_err();
        assert!(matches!(err, CapabilityError::Storage(StorageError::Corruption(_))));
    }
}
