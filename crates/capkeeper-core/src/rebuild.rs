// Volatile cache rebuild
//
// After a process start the durable index is intact but every handle is
// gone. The rebuild walks the durable index once and mints one handle per
// live capability. It runs on a copy of the caller's context whose meters are
// replaced with fresh unlimited ones, so the caller's meters see none of the
// reads it performs.

use tracing::info;

use capkeeper_error::CapabilityResult;

use crate::context::Context;
use crate::keeper::Keeper;
use crate::meter::SharedMeter;
use crate::types::{Capability, CapabilityIndex, CapabilityOwners};
use crate::volatile::mint;

impl Keeper {
    /// Rebuild the volatile cache from the durable index
    ///
    /// A no-op once the volatile store is initialized, which keeps every
    /// handle handed out before the second call valid.
    pub fn initialize_mem_store(&self, ctx: &Context) -> CapabilityResult<()> {
        if self.mem_store().is_initialized() {
            return Ok(());
        }

        let unmetered = ctx
            .clone()
            .with_gas_meter(SharedMeter::infinite())
            .with_block_gas_meter(SharedMeter::infinite());

        let records = self.durable(&unmetered).iterate_owners()?;
        for (index, owners) in &records {
            self.restore_handle(*index, owners);
        }

        self.mem_store().set_initialized();
        info!(count = records.len(), height = ctx.block_height(), "rebuilt capability handles");
        Ok(())
    }

    /// Make the handle for `index` live for every owner in `owners`
    ///
    /// An index that already has a handle keeps it.
    pub(crate) fn restore_handle(&self, index: CapabilityIndex, owners: &CapabilityOwners) -> Capability {
        let mem = self.mem_store();
        let cap = match mem.get_forward(index) {
            Some(cap) => cap,
            None => {
                let cap = mint(&**mem, index);
                mem.set_forward(index, cap.clone());
                cap
            }
        };
        for owner in owners.iter() {
            mem.set_reverse(&owner.module, &owner.name, cap.clone());
        }
        cap
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use capkeeper_db::{Database, MemoryDb};

    use crate::context::Context;
    use crate::keeper::Keeper;
    use crate::meter::SharedMeter;
    use crate::volatile::MemStore;

    #[test]
    fn test_rebuild_restores_handles() {
        let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
        let ctx = Context::new(db);

        let before = Keeper::new("capability", Arc::new(MemStore::new()));
        let cap = before.new_capability(&ctx, "bank", "transfer").unwrap();
        before.claim_capability(&ctx, &cap, "staking", "transfer").unwrap();

        let after = Keeper::new("capability", Arc::new(MemStore::new()));
        assert!(!after.is_initialized());
        assert_eq!(after.get_capability(&ctx, "bank", "transfer").unwrap(), None);

        after.initialize_mem_store(&ctx).unwrap();
        let bank = after.get_capability(&ctx, "bank", "transfer").unwrap().unwrap();
        let staking = after.get_capability(&ctx, "staking", "transfer").unwrap().unwrap();
        assert_eq!(bank, staking);
        assert_eq!(bank.index(), cap.index());
        assert_ne!(bank, cap);
    }

    #[test]
    fn test_rebuild_is_unmetered() {
        let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
        let setup = Context::new(db.clone());
        let keeper = Keeper::new("capability", Arc::new(MemStore::new()));
        for i in 0..3 {
            keeper.new_capability(&setup, "bank", &format!("port-{i}")).unwrap();
        }

        let ctx = Context::new(db)
            .with_gas_meter(SharedMeter::limited(50))
            .with_block_gas_meter(SharedMeter::limited(50));
        let fresh = Keeper::new("capability", Arc::new(MemStore::new()));
        fresh.initialize_mem_store(&ctx).unwrap();

        assert_eq!(ctx.gas_meter().consumed(), 0);
        assert_eq!(ctx.block_gas_meter().unwrap().consumed(), 0);
        assert!(fresh.get_capability(&setup, "bank", "port-2").unwrap().is_some());
    }
}
