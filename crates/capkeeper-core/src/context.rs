//! Execution context
//!
//! A [`Context`] is what the host hands to every keeper call for one unit of
//! deterministic work: the durable store (usually a [`CacheDb`] branch that
//! is committed or dropped with the unit of work), the transaction and block
//! meters, and the storage cost schedule. Contexts are cheap to clone and are
//! derived with `with_*` builders, the way the host swaps meters in and out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use capkeeper_db::{CacheDb, Database, DbIterator, PrefixDb};
use capkeeper_error::{CapabilityResult, StorageError};

use crate::meter::SharedMeter;

/// Storage access cost schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub has_cost: u64,
    pub delete_cost: u64,
    pub read_cost_flat: u64,
    pub read_cost_per_byte: u64,
    pub write_cost_flat: u64,
    pub write_cost_per_byte: u64,
    pub iter_next_cost_flat: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            has_cost: 1000,
            delete_cost: 1000,
            read_cost_flat: 1000,
            read_cost_per_byte: 3,
            write_cost_flat: 2000,
            write_cost_per_byte: 30,
            iter_next_cost_flat: 30,
        }
    }
}

impl GasConfig {
    /// A schedule that charges nothing
    pub fn free() -> Self {
        Self {
            has_cost: 0,
            delete_cost: 0,
            read_cost_flat: 0,
            read_cost_per_byte: 0,
            write_cost_flat: 0,
            write_cost_per_byte: 0,
            iter_next_cost_flat: 0,
        }
    }
}

/// Metered view of one store-key namespace
///
/// Every access charges the context's transaction meter and, when present,
/// its block meter according to the [`GasConfig`].
pub struct GasKv {
    store: PrefixDb,
    gas_meter: SharedMeter,
    block_gas_meter: Option<SharedMeter>,
    config: GasConfig,
}

impl GasKv {
    fn charge(&self, amount: u64, descriptor: &str) -> CapabilityResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.gas_meter.consume(amount, descriptor)?;
        if let Some(block) = &self.block_gas_meter {
            block.consume(amount, descriptor)?;
        }
        Ok(())
    }

    fn per_byte(cost: u64, len: usize) -> u64 {
        cost.saturating_mul(len as u64)
    }

    pub fn get(&self, key: &[u8]) -> CapabilityResult<Option<Vec<u8>>> {
        self.charge(self.config.read_cost_flat, "ReadFlat")?;
        let value = self.store.get(key).map_err(StorageError::from)?;
        let len = key.len() + value.as_ref().map_or(0, Vec::len);
        self.charge(Self::per_byte(self.config.read_cost_per_byte, len), "ReadPerByte")?;
        Ok(value)
    }

    pub fn has(&self, key: &[u8]) -> CapabilityResult<bool> {
        self.charge(self.config.has_cost, "Has")?;
        Ok(self.store.contains(key).map_err(StorageError::from)?)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> CapabilityResult<()> {
        self.charge(self.config.write_cost_flat, "WriteFlat")?;
        self.charge(Self::per_byte(self.config.write_cost_per_byte, key.len()), "WritePerByte")?;
        self.charge(Self::per_byte(self.config.write_cost_per_byte, value.len()), "WritePerByte")?;
        Ok(self.store.put(key, value).map_err(StorageError::from)?)
    }

    pub fn delete(&self, key: &[u8]) -> CapabilityResult<()> {
        self.charge(self.config.delete_cost, "Delete")?;
        Ok(self.store.delete(key).map_err(StorageError::from)?)
    }

    /// All entries under `prefix` in ascending key order, prefix stripped
    pub fn prefix_scan(&self, prefix: &[u8]) -> CapabilityResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut iter = self.store.prefix_iterator(prefix).map_err(StorageError::from)?;
        let mut items = Vec::new();
        while let Some(item) = iter.next() {
            let (key, value) = item.map_err(StorageError::from)?;
            self.charge(self.config.iter_next_cost_flat, "IterNextFlat")?;
            self.charge(
                Self::per_byte(self.config.read_cost_per_byte, key.len() + value.len()),
                "ValuePerByte",
            )?;
            let stripped = key
                .strip_prefix(prefix)
                .ok_or_else(|| StorageError::Corruption("prefix scan escaped its prefix".to_string()))?
                .to_vec();
            items.push((stripped, value));
        }
        Ok(items)
    }
}

/// Execution context for one unit of deterministic work
#[derive(Clone)]
pub struct Context {
    store: Arc<dyn Database>,
    gas_meter: SharedMeter,
    block_gas_meter: Option<SharedMeter>,
    gas_config: GasConfig,
    block_height: u64,
}

impl Context {
    /// Create a context over `store` with an unlimited transaction meter and
    /// no block meter
    pub fn new(store: Arc<dyn Database>) -> Self {
        Self {
            store,
            gas_meter: SharedMeter::infinite(),
            block_gas_meter: None,
            gas_config: GasConfig::default(),
            block_height: 0,
        }
    }

    pub fn with_gas_meter(mut self, meter: SharedMeter) -> Self {
        self.gas_meter = meter;
        self
    }

    pub fn with_block_gas_meter(mut self, meter: SharedMeter) -> Self {
        self.block_gas_meter = Some(meter);
        self
    }

    pub fn with_gas_config(mut self, config: GasConfig) -> Self {
        self.gas_config = config;
        self
    }

    pub fn with_block_height(mut self, height: u64) -> Self {
        self.block_height = height;
        self
    }

    pub fn gas_meter(&self) -> &SharedMeter {
        &self.gas_meter
    }

    pub fn block_gas_meter(&self) -> Option<&SharedMeter> {
        self.block_gas_meter.as_ref()
    }

    pub fn gas_config(&self) -> &GasConfig {
        &self.gas_config
    }

    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// The raw durable store, without metering
    pub fn store(&self) -> &Arc<dyn Database> {
        &self.store
    }

    /// Metered view of the `store_key` namespace
    pub fn kv_store(&self, store_key: &str) -> GasKv {
        let mut prefix = store_key.as_bytes().to_vec();
        prefix.push(b'/');
        GasKv {
            store: PrefixDb::new(self.store.clone(), prefix),
            gas_meter: self.gas_meter.clone(),
            block_gas_meter: self.block_gas_meter.clone(),
            config: self.gas_config.clone(),
        }
    }

    /// Start a nested unit of work
    ///
    /// The returned context writes into a fresh cache layer over this
    /// context's store and shares its meters. Its writes reach this context
    /// only through [`Branch::commit`].
    pub fn branch(&self) -> (Context, Branch) {
        let cache = Arc::new(CacheDb::new(self.store.clone()));
        let mut child = self.clone();
        child.store = cache.clone();
        (child, Branch { cache })
    }
}

/// Commit guard for a context created by [`Context::branch`]
///
/// Dropping the guard without committing rolls the branch back.
pub struct Branch {
    cache: Arc<CacheDb>,
}

impl Branch {
    /// Apply the branch's writes to the parent store atomically
    pub fn commit(self) -> CapabilityResult<()> {
        self.cache.commit().map_err(StorageError::from)?;
        Ok(())
    }

    /// Drop the branch's writes
    pub fn discard(self) -> CapabilityResult<()> {
        self.cache.discard().map_err(StorageError::from)?;
        Ok(())
    }
}
