// Durable key layout
//
// All keys live inside the keeper's store-key namespace. Indices are encoded
// big-endian so that byte order equals numeric order and a prefix scan over
// `KEY_PREFIX_INDEX_CAPABILITY` yields owner sets in ascending index order.

use capkeeper_error::{CapabilityError, CapabilityResult};

use crate::types::CapabilityIndex;

/// Next index to allocate
pub const KEY_INDEX: &[u8] = b"index";

/// Forward records: index -> owner set
pub const KEY_PREFIX_INDEX_CAPABILITY: &[u8] = b"capability_index";

/// Reverse records: (owner, name) -> index
pub const KEY_PREFIX_REV_CAPABILITY: &[u8] = b"capability_rev";

/// Fixed-width encoding of an index
pub fn index_to_key(index: CapabilityIndex) -> [u8; 8] {
    index.to_be_bytes()
}

/// Decode an index written by [`index_to_key`]
pub fn index_from_key(bytes: &[u8]) -> Option<CapabilityIndex> {
    let bytes: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// Key of the forward record for `index`
pub fn fwd_capability_key(index: CapabilityIndex) -> Vec<u8> {
    let mut key = Vec::with_capacity(KEY_PREFIX_INDEX_CAPABILITY.len() + 8);
    key.extend_from_slice(KEY_PREFIX_INDEX_CAPABILITY);
    key.extend_from_slice(&index_to_key(index));
    key
}

/// Big-endian `u32` length prefix; owners longer than `u32::MAX` bytes are rejected
fn owner_len_prefix(len: usize) -> CapabilityResult<[u8; 4]> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| CapabilityError::InvalidName(format!("owner of {len} bytes is too long")))
}

/// Key of the reverse record for `(owner, name)`
///
/// The owner is length-prefixed so that no two pairs share a key.
pub fn rev_capability_key(owner: &str, name: &str) -> CapabilityResult<Vec<u8>> {
    let len = owner_len_prefix(owner.len())?;
    let mut key = Vec::with_capacity(KEY_PREFIX_REV_CAPABILITY.len() + 4 + owner.len() + name.len());
    key.extend_from_slice(KEY_PREFIX_REV_CAPABILITY);
    key.extend_from_slice(&len);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(name.as_bytes());
    Ok(key)
}
