// Module-scoped capability keeper
//
// A thin view over the keeper that fixes the owner to one module name. It
// holds no state of its own and never touches the stores directly.

use tracing::debug;

use capkeeper_error::{CapabilityError, CapabilityResult};

use crate::context::Context;
use crate::keeper::Keeper;
use crate::types::{Capability, CapabilityOwners};

/// Capability keeper bound to a single module
#[derive(Debug, Clone)]
pub struct ScopedKeeper {
    keeper: Keeper,
    module: String,
}

impl ScopedKeeper {
    pub(crate) fn new(keeper: Keeper, module: String) -> Self {
        Self { keeper, module }
    }

    /// Name of the module this view acts for
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn new_capability(&self, ctx: &Context, name: &str) -> CapabilityResult<Capability> {
        self.keeper.new_capability(ctx, &self.module, name)
    }

    pub fn get_capability(&self, ctx: &Context, name: &str) -> CapabilityResult<Option<Capability>> {
        self.keeper.get_capability(ctx, &self.module, name)
    }

    pub fn authenticate_capability(&self, cap: &Capability, name: &str) -> bool {
        self.keeper.authenticate_capability(cap, &self.module, name)
    }

    pub fn claim_capability(&self, ctx: &Context, cap: &Capability, name: &str) -> CapabilityResult<()> {
        self.keeper.claim_capability(ctx, cap, &self.module, name)
    }

    pub fn release_capability(&self, ctx: &Context, cap: &Capability, name: &str) -> CapabilityResult<()> {
        self.keeper.release_capability(ctx, cap, &self.module, name)
    }

    /// Modules sharing the capability this module holds under `name`
    ///
    /// Returns the modules in name order together with this module's handle.
    pub fn lookup_modules(&self, ctx: &Context, name: &str) -> CapabilityResult<(Vec<String>, Capability)> {
        let cap = self
            .get_capability(ctx, name)?
            .ok_or_else(|| CapabilityError::not_found(format!("{}/{}", self.module, name)))?;
        let modules = self.keeper.lookup_modules(ctx, cap.index())?;
        debug!(module = %self.module, name, index = cap.index(), "looked up capability modules");
        Ok((modules.into_iter().collect(), cap))
    }

    /// Owners of the capability this module holds under `name`
    pub fn get_owners(&self, ctx: &Context, name: &str) -> CapabilityResult<Option<CapabilityOwners>> {
        match self.get_capability(ctx, name)? {
            Some(cap) => self.keeper.get_owners(ctx, cap.index()),
            None => Ok(None),
        }
    }
}
