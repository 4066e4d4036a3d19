//! Genesis import and export
//!
//! The genesis state is the durable index in portable form: the next index to
//! allocate and the owner set of every live capability. It carries no
//! handles; importing it mints fresh ones.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use capkeeper_error::{ensure, CapabilityError, CapabilityResult};

use crate::context::Context;
use crate::keeper::Keeper;
use crate::types::{CapabilityIndex, CapabilityOwners};

/// Owners of one capability in a genesis state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisOwners {
    pub index: CapabilityIndex,
    pub index_owners: CapabilityOwners,
}

impl GenesisOwners {
    pub fn new(index: CapabilityIndex, index_owners: CapabilityOwners) -> Self {
        Self { index, index_owners }
    }
}

/// Portable form of a keeper's durable index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Next index to allocate
    pub index: CapabilityIndex,

    /// Live capabilities
    #[serde(default)]
    pub owners: Vec<GenesisOwners>,
}

impl GenesisState {
    pub fn new(index: CapabilityIndex, owners: Vec<GenesisOwners>) -> Self {
        Self { index, owners }
    }

    /// Check that the state describes a consistent durable index
    pub fn validate(&self) -> CapabilityResult<()> {
        let mut indices = BTreeSet::new();
        let mut pairs = BTreeSet::new();

        for entry in &self.owners {
            ensure!(
                entry.index < self.index,
                CapabilityError::invalid_genesis(format!(
                    "owners index {} must be less than the next index {}",
                    entry.index, self.index
                ))
            );
            ensure!(
                indices.insert(entry.index),
                CapabilityError::invalid_genesis(format!("duplicate owners index {}", entry.index))
            );
            ensure!(
                !entry.index_owners.is_empty(),
                CapabilityError::invalid_genesis(format!("owners of index {} are empty", entry.index))
            );
            ensure!(
                entry.index_owners.is_canonical(),
                CapabilityError::invalid_genesis(format!("owners of index {} are not sorted", entry.index))
            );

            for owner in entry.index_owners.iter() {
                owner
                    .validate()
                    .map_err(|e| CapabilityError::invalid_genesis(format!("index {}: {e}", entry.index)))?;
                ensure!(
                    pairs.insert(owner.key()),
                    CapabilityError::invalid_genesis(format!("owner {owner} holds more than one capability"))
                );
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> CapabilityResult<Self> {
        serde_json::from_str(json).map_err(|e| CapabilityError::invalid_genesis(e.to_string()))
    }

    pub fn to_json(&self) -> CapabilityResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CapabilityError::invalid_genesis(e.to_string()))
    }
}

/// Load `state` into an empty keeper
///
/// Writes the index counter and every owner set, then makes a handle live for
/// each capability and marks the volatile store as rebuilt.
pub fn init_genesis(keeper: &Keeper, ctx: &Context, state: &GenesisState) -> CapabilityResult<()> {
    state.validate()?;
    keeper.initialize_index(ctx, state.index)?;

    for entry in &state.owners {
        keeper.initialize_capability(ctx, entry.index, &entry.index_owners)?;
    }
    keeper.mem_store().set_initialized();

    info!(index = state.index, count = state.owners.len(), "imported capability genesis");
    Ok(())
}

/// Export the keeper's durable index
pub fn export_genesis(keeper: &Keeper, ctx: &Context) -> CapabilityResult<GenesisState> {
    let index = keeper.latest_index(ctx)?;
    let owners = keeper
        .export_owners(ctx)?
        .into_iter()
        .map(|(index, owners)| GenesisOwners::new(index, owners))
        .collect();
    Ok(GenesisState { index, owners })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Owner;

    fn owners(pairs: &[(&str, &str)]) -> CapabilityOwners {
        CapabilityOwners::from_owners(pairs.iter().map(|(m, n)| Owner::new(*m, *n)))
    }

    #[test]
    fn test_default_genesis_is_valid() {
        let state = GenesisState::default();
        assert_eq!(state.index, 0);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_states() {
        let index_too_high = GenesisState::new(1, vec![GenesisOwners::new(1, owners(&[("bank", "a")]))]);
        assert!(index_too_high.validate().is_err());

        let duplicate = GenesisState::new(
            5,
            vec![
                GenesisOwners::new(1, owners(&[("bank", "a")])),
                GenesisOwners::new(1, owners(&[("bank", "b")])),
            ],
        );
        assert!(duplicate.validate().is_err());

        let empty = GenesisState::new(5, vec![GenesisOwners::new(1, CapabilityOwners::new())]);
        assert!(empty.validate().is_err());

        let shared_pair = GenesisState::new(
            5,
            vec![
                GenesisOwners::new(1, owners(&[("bank", "a")])),
                GenesisOwners::new(2, owners(&[("bank", "a")])),
            ],
        );
        assert!(shared_pair.validate().is_err());

        let blank = GenesisState::new(5, vec![GenesisOwners::new(1, owners(&[("bank", "")]))]);
        assert!(matches!(blank.validate(), Err(CapabilityError::InvalidGenesis(_))));
    }

    #[test]
    fn test_json_shape() {
        let state = GenesisState::new(3, vec![GenesisOwners::new(2, owners(&[("ibc", "port/transfer")]))]);
        let value: serde_json::Value = serde_json::from_str(&state.to_json().unwrap()).unwrap();
        assert_eq!(value["index"], 3);
        assert_eq!(value["owners"][0]["index_owners"]["owners"][0]["module"], "ibc");
        assert_eq!(GenesisState::from_json(&state.to_json().unwrap()).unwrap(), state);
    }

    #[test]
    fn test_unsorted_json_rejected() {
        let json = r#"{"index": 5, "owners": [{"index": 1, "index_owners": {"owners": [
            {"module": "staking", "name": "a"}, {"module": "bank", "name": "a"}
        ]}}]}"#;
        let state = GenesisState::from_json(json).unwrap();
        assert!(state.validate().is_err());
    }
}
