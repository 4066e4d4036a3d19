//! Capability keeper
//!
//! The [`Keeper`] owns the durable index (through the context it is handed on
//! every call) and the volatile handle cache. Modules never talk to it
//! directly; they receive a [`ScopedKeeper`] from [`Keeper::scope_to_module`]
//! while the application is being wired, after which the keeper is sealed.
//!
//! Every mutating operation writes the durable records first and updates the
//! volatile cache only once all durable writes have succeeded, so a failed
//! call leaves both stores as they were.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use capkeeper_error::{bail, ensure, CapabilityError, CapabilityResult, StorageError};

use crate::config::KeeperConfig;
use crate::context::Context;
use crate::durable::DurableIndex;
use crate::scoped::ScopedKeeper;
use crate::types::{validate_name, Capability, CapabilityIndex, CapabilityOwners, Owner};
use crate::volatile::{mint, VolatileStore};

struct KeeperInner {
    store_key: String,
    mem: Arc<dyn VolatileStore>,
    scoped_modules: Mutex<BTreeSet<String>>,
    sealed: AtomicBool,
}

/// Capability registry
///
/// Cloning a keeper yields another handle to the same registry.
#[derive(Clone)]
pub struct Keeper {
    inner: Arc<KeeperInner>,
}

impl Keeper {
    /// Create a keeper whose durable records live under `store_key`
    pub fn new(store_key: impl Into<String>, mem: Arc<dyn VolatileStore>) -> Self {
        Self {
            inner: Arc::new(KeeperInner {
                store_key: store_key.into(),
                mem,
                scoped_modules: Mutex::new(BTreeSet::new()),
                sealed: AtomicBool::new(false),
            }),
        }
    }

    pub fn from_config(config: &KeeperConfig, mem: Arc<dyn VolatileStore>) -> Self {
        Self::new(config.store_key.clone(), mem)
    }

    pub fn store_key(&self) -> &str {
        &self.inner.store_key
    }

    pub(crate) fn mem_store(&self) -> &Arc<dyn VolatileStore> {
        &self.inner.mem
    }

    pub(crate) fn durable(&self, ctx: &Context) -> DurableIndex {
        DurableIndex::open(ctx, &self.inner.store_key)
    }

    /// Create the scoped view for `module`
    ///
    /// Each module can be scoped once, and only until the keeper is sealed.
    pub fn scope_to_module(&self, module: &str) -> CapabilityResult<ScopedKeeper> {
        validate_name(module)?;
        ensure!(!self.is_sealed(), CapabilityError::Sealed);

        let mut scoped = self.inner.scoped_modules.lock();
        ensure!(
            scoped.insert(module.to_string()),
            CapabilityError::ModuleAlreadyScoped(module.to_string())
        );
        debug!(module, "scoped capability keeper");
        Ok(ScopedKeeper::new(self.clone(), module.to_string()))
    }

    /// Stop handing out scoped keepers
    pub fn seal(&self) -> CapabilityResult<()> {
        self.inner
            .sealed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CapabilityError::Sealed)?;
        info!(modules = self.inner.scoped_modules.lock().len(), "capability keeper sealed");
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.inner.sealed.load(Ordering::Acquire)
    }

    /// Modules that have been handed a scoped keeper, in name order
    pub fn scoped_modules(&self) -> Vec<String> {
        self.inner.scoped_modules.lock().iter().cloned().collect()
    }

    /// Whether the volatile cache has been rebuilt in this process
    pub fn is_initialized(&self) -> bool {
        self.inner.mem.is_initialized()
    }

    /// Set the next index on a store that has never allocated one
    pub fn initialize_index(&self, ctx: &Context, index: CapabilityIndex) -> CapabilityResult<()> {
        let durable = self.durable(ctx);
        ensure!(
            !durable.has_index()?,
            CapabilityError::InvalidIndex(format!(
                "index counter already set to {}",
                durable.latest_index()?
            ))
        );
        durable.set_index(index)?;
        info!(index, "initialized capability index");
        Ok(())
    }

    /// The next index that will be allocated
    pub fn latest_index(&self, ctx: &Context) -> CapabilityResult<CapabilityIndex> {
        self.durable(ctx).latest_index()
    }

    /// Write the durable records for `index` held by `owners`
    ///
    /// Used when importing state; it does not touch the volatile cache.
    pub fn set_owners(&self, ctx: &Context, index: CapabilityIndex, owners: &CapabilityOwners) -> CapabilityResult<()> {
        ensure!(
            !owners.is_empty(),
            CapabilityError::invalid_genesis(format!("index {index} has no owners"))
        );
        let durable = self.durable(ctx);
        durable.put_owners(index, owners)?;
        for owner in owners.iter() {
            durable.put_reverse(&owner.module, &owner.name, index)?;
        }
        Ok(())
    }

    /// Import `index` held by `owners` and make its handle live
    pub fn initialize_capability(
        &self,
        ctx: &Context,
        index: CapabilityIndex,
        owners: &CapabilityOwners,
    ) -> CapabilityResult<Capability> {
        self.set_owners(ctx, index, owners)?;
        Ok(self.restore_handle(index, owners))
    }

    /// Create a new capability owned by `(owner, name)`
    pub fn new_capability(&self, ctx: &Context, owner: &str, name: &str) -> CapabilityResult<Capability> {
        validate_name(owner)?;
        validate_name(name)?;

        let durable = self.durable(ctx);
        if durable.get_reverse(owner, name)?.is_some() {
            bail!(CapabilityError::already_exists(owner, name));
        }

        let index = durable.allocate_index()?;
        durable.put_owners(index, &CapabilityOwners::single(Owner::new(owner, name)))?;
        durable.put_reverse(owner, name, index)?;

        let mem = self.mem_store();
        let cap = mint(&**mem, index);
        mem.set_forward(index, cap.clone());
        mem.set_reverse(owner, name, cap.clone());

        debug!(index, module = owner, name, "created capability");
        Ok(cap)
    }

    /// The live handle held by `(owner, name)`
    ///
    /// The handle comes from the volatile cache, but it is returned only
    /// while the durable owner record of its index in `ctx` still lists
    /// `(owner, name)`. Before the cache has been rebuilt this returns
    /// `None` without touching storage.
    pub fn get_capability(&self, ctx: &Context, owner: &str, name: &str) -> CapabilityResult<Option<Capability>> {
        let cap = match self.mem_store().get_reverse(owner, name) {
            Some(cap) if self.is_live(&cap) => cap,
            _ => return Ok(None),
        };
        let owned = self
            .durable(ctx)
            .get_owners(cap.index())?
            .map_or(false, |owners| owners.contains(owner, name));
        Ok(owned.then_some(cap))
    }

    /// Whether `cap` is the handle cached for its index
    fn is_live(&self, cap: &Capability) -> bool {
        self.mem_store()
            .get_forward(cap.index())
            .map_or(false, |live| live.same_handle(cap))
    }

    /// Whether `cap` is the handle held by `(owner, name)`
    pub fn authenticate_capability(&self, cap: &Capability, owner: &str, name: &str) -> bool {
        self.mem_store()
            .get_reverse(owner, name)
            .map_or(false, |held| held.same_handle(cap))
    }

    /// Add `(owner, name)` as an owner of the live handle `cap`
    pub fn claim_capability(&self, ctx: &Context, cap: &Capability, owner: &str, name: &str) -> CapabilityResult<()> {
        validate_name(owner)?;
        validate_name(name)?;

        let index = cap.index();
        let durable = self.durable(ctx);
        let mut owners = durable
            .get_owners(index)?
            .ok_or_else(|| CapabilityError::not_found(format!("index {index}")))?;

        ensure!(
            self.is_live(cap),
            CapabilityError::not_found(format!("live handle for index {index}"))
        );

        if durable.get_reverse(owner, name)?.is_some() {
            bail!(CapabilityError::owner_already_exists(owner, name));
        }
        owners.set(Owner::new(owner, name))?;

        durable.put_owners(index, &owners)?;
        durable.put_reverse(owner, name, index)?;
        self.mem_store().set_reverse(owner, name, cap.clone());

        debug!(index, module = owner, name, "claimed capability");
        Ok(())
    }

    /// Remove `(owner, name)` from the owners of `cap`
    ///
    /// `cap` must be the live handle `(owner, name)` holds. The capability is
    /// deleted once its last owner releases it. Its index is never allocated
    /// again.
    pub fn release_capability(&self, ctx: &Context, cap: &Capability, owner: &str, name: &str) -> CapabilityResult<()> {
        ensure!(
            self.is_live(cap) && self.authenticate_capability(cap, owner, name),
            CapabilityError::not_owner(owner, name)
        );

        let index = cap.index();
        let durable = self.durable(ctx);
        ensure!(
            durable.get_reverse(owner, name)? == Some(index),
            CapabilityError::not_owner(owner, name)
        );

        let mut owners = durable
            .get_owners(index)?
            .ok_or_else(|| StorageError::Corruption(format!("reverse record {owner}/{name} points at missing index {index}")))?;
        if !owners.remove(owner, name) {
            bail!(StorageError::Corruption(format!(
                "reverse record {owner}/{name} is not an owner of index {index}"
            )));
        }

        durable.delete_reverse(owner, name)?;
        if owners.is_empty() {
            durable.delete_owners(index)?;
        } else {
            durable.put_owners(index, &owners)?;
        }

        let mem = self.mem_store();
        mem.delete_reverse(owner, name);
        if owners.is_empty() {
            mem.delete_forward(index);
            debug!(index, module = owner, name, "released last owner, capability deleted");
        } else {
            debug!(index, module = owner, name, "released capability");
        }
        Ok(())
    }

    /// Names of the modules owning `index`
    pub fn lookup_modules(&self, ctx: &Context, index: CapabilityIndex) -> CapabilityResult<BTreeSet<String>> {
        self.get_owners(ctx, index)?
            .map(|owners| owners.modules())
            .ok_or_else(|| CapabilityError::not_found(format!("index {index}")))
    }

    pub fn get_owners(&self, ctx: &Context, index: CapabilityIndex) -> CapabilityResult<Option<CapabilityOwners>> {
        self.durable(ctx).get_owners(index)
    }

    /// Every live capability with its owners, in ascending index order
    pub fn export_owners(&self, ctx: &Context) -> CapabilityResult<Vec<(CapabilityIndex, CapabilityOwners)>> {
        self.durable(ctx).iterate_owners()
    }
}

impl fmt::Debug for Keeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keeper")
            .field("store_key", &self.inner.store_key)
            .field("sealed", &self.is_sealed())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
