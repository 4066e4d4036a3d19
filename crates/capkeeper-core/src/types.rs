// Capability types
//
// Owners and owner sets are plain data that is persisted in the durable
// index. `Capability` is the opposite: an in-process handle whose identity is
// the only thing that authenticates it, and which is never persisted.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use capkeeper_error::{CapabilityError, CapabilityResult};

/// Index of a capability in the durable index, never reused
pub type CapabilityIndex = u64;

/// Reject empty or whitespace-only module and capability names
pub fn validate_name(name: &str) -> CapabilityResult<()> {
    if name.trim().is_empty() {
        return Err(CapabilityError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A module holding a capability under a name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Owner {
    pub module: String,
    pub name: String,
}

impl Owner {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// The owner's key, `<module>/<name>`
    pub fn key(&self) -> String {
        format!("{}/{}", self.module, self.name)
    }

    pub fn validate(&self) -> CapabilityResult<()> {
        validate_name(&self.module)?;
        validate_name(&self.name)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.name)
    }
}

/// The set of owners of one capability
///
/// Owners are kept sorted by `(module, name)` without duplicates, so the
/// borsh encoding of equal sets is byte-for-byte identical on every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CapabilityOwners {
    owners: Vec<Owner>,
}

impl CapabilityOwners {
    /// Create an empty owner set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set holding a single owner
    pub fn single(owner: Owner) -> Self {
        Self { owners: vec![owner] }
    }

    /// Build a canonical set from owners in any order, dropping duplicates
    pub fn from_owners(owners: impl IntoIterator<Item = Owner>) -> Self {
        let owners: BTreeSet<Owner> = owners.into_iter().collect();
        Self {
            owners: owners.into_iter().collect(),
        }
    }

    /// Add an owner, keeping the set sorted
    pub fn set(&mut self, owner: Owner) -> CapabilityResult<()> {
        match self.owners.binary_search(&owner) {
            Ok(_) => Err(CapabilityError::owner_already_exists(owner.module, owner.name)),
            Err(pos) => {
                self.owners.insert(pos, owner);
                Ok(())
            }
        }
    }

    /// Remove an owner; returns whether it was present
    pub fn remove(&mut self, module: &str, name: &str) -> bool {
        let owner = Owner::new(module, name);
        match self.owners.binary_search(&owner) {
            Ok(pos) => {
                self.owners.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, module: &str, name: &str) -> bool {
        self.owners.binary_search(&Owner::new(module, name)).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Owner> {
        self.owners.iter()
    }

    /// Names of all modules holding the capability
    pub fn modules(&self) -> BTreeSet<String> {
        self.owners.iter().map(|o| o.module.clone()).collect()
    }

    /// Whether the owners are strictly sorted, as every stored set must be
    pub fn is_canonical(&self) -> bool {
        self.owners.windows(2).all(|w| w[0] < w[1])
    }

    pub fn into_vec(self) -> Vec<Owner> {
        self.owners
    }
}

struct Handle {
    index: CapabilityIndex,
    token: u64,
}

/// An unforgeable, in-process capability handle
///
/// Equality is handle identity: two `Capability` values are equal only if
/// they are clones of the same handle. A handle rebuilt from the durable
/// index after a restart is a different handle, even though it carries the
/// same index. Handles can only be minted by a volatile store.
#[derive(Clone)]
pub struct Capability {
    inner: Arc<Handle>,
}

impl Capability {
    pub(crate) fn new(index: CapabilityIndex, token: u64) -> Self {
        Self {
            inner: Arc::new(Handle { index, token }),
        }
    }

    /// Durable index the handle refers to
    pub fn index(&self) -> CapabilityIndex {
        self.inner.index
    }

    /// Creation sequence number within the minting volatile store
    pub fn token(&self) -> u64 {
        self.inner.token
    }

    /// Whether both values are the same handle
    pub fn same_handle(&self, other: &Capability) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.same_handle(other)
    }
}

impl Eq for Capability {}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("index", &self.inner.index)
            .field("token", &self.inner.token)
            .finish()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability{{index: {}}}", self.inner.index)
    }
}
