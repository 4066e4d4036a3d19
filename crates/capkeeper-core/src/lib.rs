//! Capability registry keeper
//!
//! Grants modules of a deterministic state machine exclusive, unforgeable
//! handles ([`Capability`]) to shared resources. Ownership is recorded in a
//! durable index that survives restarts and is replicated through consensus;
//! the handles themselves only ever live in a volatile in-process cache.
//!
//! After a process start the volatile cache is empty. The host calls
//! [`LifecycleHook::on_process_start_or_block_begin`] at the start of the
//! first unit of work, which rebuilds every handle from the durable index
//! exactly once and without charging the caller's meters.
//!
//! ```ignore
//! let db = DbFactory::create_memory_db()?;
//! let ctx = Context::new(db);
//! let keeper = Keeper::new("capability", Arc::new(MemStore::new()));
//! let bank = keeper.scope_to_module("bank")?;
//! keeper.seal()?;
//!
//! let cap = bank.new_capability(&ctx, "transfer")?;
//! assert!(bank.authenticate_capability(&cap, "transfer"));
//! ```

pub mod config;
pub mod context;
pub mod durable;
pub mod genesis;
pub mod keeper;
pub mod keys;
pub mod logging;
pub mod meter;
pub mod module;
pub mod scoped;
pub mod types;
pub mod volatile;

mod rebuild;

pub use config::KeeperConfig;
pub use context::{Branch, Context, GasConfig, GasKv};
pub use durable::DurableIndex;
pub use genesis::{GenesisOwners, GenesisState};
pub use keeper::Keeper;
pub use meter::{BasicMeter, InfiniteMeter, Meter, SharedMeter};
pub use module::{CapabilityModule, LifecycleHook};
pub use scoped::ScopedKeeper;
pub use types::{Capability, CapabilityIndex, CapabilityOwners, Owner};
pub use volatile::{MemStore, VolatileStore};

pub use capkeeper_error::{CapabilityError, CapabilityResult, KeeperError, MeterError, StorageError};
