// Volatile capability cache
//
// Holds the live capability handles of this process. Nothing here is ever
// persisted, committed or rolled back: a discarded store takes its handles
// and its initialized flag with it, and a fresh store starts uninitialized.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::types::{Capability, CapabilityIndex};

/// Process-local store of capability handles
pub trait VolatileStore: Send + Sync {
    /// Whether the rebuild protocol has run against this store
    fn is_initialized(&self) -> bool;

    fn set_initialized(&self);

    fn get_forward(&self, index: CapabilityIndex) -> Option<Capability>;

    fn set_forward(&self, index: CapabilityIndex, cap: Capability);

    fn delete_forward(&self, index: CapabilityIndex);

    fn get_reverse(&self, owner: &str, name: &str) -> Option<Capability>;

    fn set_reverse(&self, owner: &str, name: &str, cap: Capability);

    fn delete_reverse(&self, owner: &str, name: &str);

    /// Next creation sequence number of this store
    fn next_token(&self) -> u64;
}

/// Create a new handle for `index`, numbered by `store`
///
/// Only the keeper mints handles, so a handle can never be forged from
/// outside this crate.
pub(crate) fn mint(store: &dyn VolatileStore, index: CapabilityIndex) -> Capability {
    Capability::new(index, store.next_token())
}

#[derive(Default)]
struct Caches {
    forward: HashMap<CapabilityIndex, Capability>,
    reverse: HashMap<(String, String), Capability>,
}

/// In-memory [`VolatileStore`]
#[derive(Default)]
pub struct MemStore {
    caches: RwLock<Caches>,
    initialized: AtomicBool,
    tokens: AtomicU64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live forward entries
    pub fn forward_len(&self) -> usize {
        self.caches.read().forward.len()
    }

    /// Number of live reverse entries
    pub fn reverse_len(&self) -> usize {
        self.caches.read().reverse.len()
    }
}

impl fmt::Debug for MemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let caches = self.caches.read();
        f.debug_struct("MemStore")
            .field("initialized", &self.is_initialized())
            .field("forward", &caches.forward.len())
            .field("reverse", &caches.reverse.len())
            .finish()
    }
}

impl VolatileStore for MemStore {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn set_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    fn get_forward(&self, index: CapabilityIndex) -> Option<Capability> {
        self.caches.read().forward.get(&index).cloned()
    }

    fn set_forward(&self, index: CapabilityIndex, cap: Capability) {
        self.caches.write().forward.insert(index, cap);
    }

    fn delete_forward(&self, index: CapabilityIndex) {
        self.caches.write().forward.remove(&index);
    }

    fn get_reverse(&self, owner: &str, name: &str) -> Option<Capability> {
        self.caches
            .read()
            .reverse
            .get(&(owner.to_string(), name.to_string()))
            .cloned()
    }

    fn set_reverse(&self, owner: &str, name: &str, cap: Capability) {
        self.caches
            .write()
            .reverse
            .insert((owner.to_string(), name.to_string()), cap);
    }

    fn delete_reverse(&self, owner: &str, name: &str) {
        self.caches
            .write()
            .reverse
            .remove(&(owner.to_string(), name.to_string()));
    }

    fn next_token(&self) -> u64 {
        self.tokens.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_is_uninitialized() {
        let store = MemStore::new();
        assert!(!store.is_initialized());
        store.set_initialized();
        assert!(store.is_initialized());
        assert!(!MemStore::new().is_initialized());
    }

    #[test]
    fn test_forward_and_reverse_entries() {
        let store = MemStore::new();
        let cap = mint(&store, 4);
        store.set_forward(4, cap.clone());
        store.set_reverse("bank", "transfer", cap.clone());

        assert_eq!(store.get_forward(4), Some(cap.clone()));
        assert_eq!(store.get_reverse("bank", "transfer"), Some(cap));
        assert_eq!(store.get_reverse("bank", "other"), None);

        store.delete_reverse("bank", "transfer");
        store.delete_forward(4);
        assert_eq!(store.forward_len(), 0);
        assert_eq!(store.reverse_len(), 0);
    }

    #[test]
    fn test_minted_handles_are_distinct() {
        let store = MemStore::new();
        let a = mint(&store, 1);
        let b = mint(&store, 1);
        assert_ne!(a, b);
        assert_eq!(a.token() + 1, b.token());
    }
}
