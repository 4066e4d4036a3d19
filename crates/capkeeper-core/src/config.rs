// Configuration for the capability keeper
//
// Read from TOML by the host; every field has a default so a partial file is
// enough.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use capkeeper_db::{Database, DbConfig, DbFactory};

use crate::context::{Context, GasConfig};

/// Configuration for the capability keeper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Namespace of the keeper's durable records
    pub store_key: String,

    /// Whether importing genesis seals the keeper
    pub seal_on_genesis: bool,

    /// Storage access costs charged to the caller's meters
    pub gas: GasConfig,

    /// Tracing filter directives
    pub log_level: String,

    /// Emit JSON logs
    pub json_logs: bool,

    /// Path of the on-disk durable store; in memory when unset
    pub db_path: Option<String>,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            store_key: "capability".to_string(),
            seal_on_genesis: true,
            gas: GasConfig::default(),
            log_level: "info".to_string(),
            json_logs: false,
            db_path: None,
        }
    }
}

impl KeeperConfig {
    /// Create a new keeper configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store_key(mut self, store_key: impl Into<String>) -> Self {
        self.store_key = store_key.into();
        self
    }

    pub fn with_seal_on_genesis(mut self, seal: bool) -> Self {
        self.seal_on_genesis = seal;
        self
    }

    pub fn with_gas(mut self, gas: GasConfig) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_json_logs(mut self, enable: bool) -> Self {
        self.json_logs = enable;
        self
    }

    pub fn with_db_path(mut self, path: impl Into<String>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).context("invalid keeper configuration")?;
        anyhow::ensure!(!config.store_key.trim().is_empty(), "store_key must not be empty");
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read keeper configuration {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Execution context over `store` charging this configuration's gas schedule
    pub fn context(&self, store: Arc<dyn Database>) -> Context {
        Context::new(store).with_gas_config(self.gas.clone())
    }

    /// Open the durable store this configuration points at
    pub fn open_database(&self) -> Result<Arc<dyn Database>> {
        let db = match &self.db_path {
            Some(path) => DbFactory::create_default_db(DbConfig::new(path)),
            None => DbFactory::create_memory_db(),
        };
        db.map_err(|e| anyhow::anyhow!("failed to open durable store: {e}"))
    }
}
