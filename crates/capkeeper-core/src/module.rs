//! Capability module lifecycle
//!
//! The host drives the keeper through [`LifecycleHook`]: it calls
//! `on_process_start_or_block_begin` at the start of every block, and the
//! first call in a process rebuilds the volatile cache. [`CapabilityModule`]
//! bundles that hook with genesis handling.

use std::sync::Arc;

use tracing::info;

use capkeeper_error::CapabilityResult;

use crate::config::KeeperConfig;
use crate::context::Context;
use crate::genesis::{self, GenesisState};
use crate::keeper::Keeper;
use crate::volatile::VolatileStore;

/// Hook run by the host before any other keeper call in a unit of work
pub trait LifecycleHook {
    /// Rebuild process-local state if this process has not done so yet
    fn on_process_start_or_block_begin(&self, ctx: &Context) -> CapabilityResult<()>;
}

impl LifecycleHook for Keeper {
    fn on_process_start_or_block_begin(&self, ctx: &Context) -> CapabilityResult<()> {
        self.initialize_mem_store(ctx)
    }
}

/// The capability module as seen by the host application
#[derive(Debug, Clone)]
pub struct CapabilityModule {
    keeper: Keeper,
    seal_on_genesis: bool,
}

impl CapabilityModule {
    pub fn new(keeper: Keeper, seal_on_genesis: bool) -> Self {
        Self { keeper, seal_on_genesis }
    }

    pub fn from_config(config: &KeeperConfig, mem: Arc<dyn VolatileStore>) -> Self {
        Self::new(Keeper::from_config(config, mem), config.seal_on_genesis)
    }

    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    pub fn begin_block(&self, ctx: &Context) -> CapabilityResult<()> {
        self.on_process_start_or_block_begin(ctx)
    }

    /// Import `state`, sealing the keeper afterwards if configured to
    pub fn init_genesis(&self, ctx: &Context, state: &GenesisState) -> CapabilityResult<()> {
        genesis::init_genesis(&self.keeper, ctx, state)?;
        if self.seal_on_genesis && !self.keeper.is_sealed() {
            self.keeper.seal()?;
        }
        Ok(())
    }

    pub fn export_genesis(&self, ctx: &Context) -> CapabilityResult<GenesisState> {
        let state = genesis::export_genesis(&self.keeper, ctx)?;
        info!(index = state.index, count = state.owners.len(), "exported capability genesis");
        Ok(state)
    }

    pub fn default_genesis() -> GenesisState {
        GenesisState::default()
    }

    /// Parse and validate a JSON genesis state
    pub fn validate_genesis(json: &str) -> CapabilityResult<GenesisState> {
        let state = GenesisState::from_json(json)?;
        state.validate()?;
        Ok(state)
    }
}

impl LifecycleHook for CapabilityModule {
    fn on_process_start_or_block_begin(&self, ctx: &Context) -> CapabilityResult<()> {
        self.keeper.on_process_start_or_block_begin(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capkeeper_db::MemoryDb;

    use crate::volatile::MemStore;

    #[test]
    fn test_init_genesis_seals_when_configured() {
        let ctx = Context::new(Arc::new(MemoryDb::new()));
        let module = CapabilityModule::from_config(&KeeperConfig::default(), Arc::new(MemStore::new()));
        module.keeper().scope_to_module("bank").unwrap();

        module.init_genesis(&ctx, &CapabilityModule::default_genesis()).unwrap();
        assert!(module.keeper().is_sealed());
        assert!(module.keeper().is_initialized());
    }

    #[test]
    fn test_init_genesis_without_seal() {
        let ctx = Context::new(Arc::new(MemoryDb::new()));
        let config = KeeperConfig::default().with_seal_on_genesis(false);
        let module = CapabilityModule::from_config(&config, Arc::new(MemStore::new()));

        module.init_genesis(&ctx, &GenesisState::default()).unwrap();
        assert!(!module.keeper().is_sealed());
    }

    #[test]
    fn test_validate_genesis_json() {
        assert!(CapabilityModule::validate_genesis(r#"{"index": 0}"#).is_ok());
        assert!(CapabilityModule::validate_genesis("not json").is_err());
    }

    #[test]
    fn test_begin_block_initializes_once() {
        let ctx = Context::new(Arc::new(MemoryDb::new()));
        let module = CapabilityModule::from_config(&KeeperConfig::default(), Arc::new(MemStore::new()));
        assert!(!module.keeper().is_initialized());
        module.begin_block(&ctx).unwrap();
        assert!(module.keeper().is_initialized());
        module.begin_block(&ctx).unwrap();
    }
}
