use crate::error::ConfigError;

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Number of symmetric key slots. Slot 0 is the active hop-field MAC key;
/// the remaining slots are reserved for rollover.
pub const SCION_KEY_N: usize = 4;

/// Maximum key length in bytes.
pub const SCION_KEY_MAX_LEN: usize = 32;

/// A symmetric key with an explicit length.
#[derive(Clone, PartialEq, Eq)]
pub struct SymKey {
    bytes: [u8; SCION_KEY_MAX_LEN],
    len: usize,
}

impl SymKey {
    /// Copy `key` into a slot value. Fails for empty or oversized keys.
    pub fn new(key: &[u8]) -> Option<Self> {
        if key.is_empty() || key.len() > SCION_KEY_MAX_LEN {
            return None;
        }
        let mut bytes = [0u8; SCION_KEY_MAX_LEN];
        bytes[..key.len()].copy_from_slice(key);
        Some(Self { bytes, len: key.len() })
    }

    /// The unset state every slot starts in.
    pub fn unset() -> Self {
        Self { bytes: [0u8; SCION_KEY_MAX_LEN], len: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn is_unset(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for SymKey {
    // key material stays out of logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymKey({} bytes)", self.len)
    }
}

/// Fixed-size array of key slots.
///
/// Rekeying publishes a whole new key value through `ArcSwap`; a dataplane
/// worker sees either the old or the new key, never a torn mix.
pub struct KeyStore {
    slots: [ArcSwap<SymKey>; SCION_KEY_N],
}

impl KeyStore {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| ArcSwap::from_pointee(SymKey::unset())),
        }
    }

    /// Replace the key in `slot`.
    pub fn set(&self, slot: usize, key: &[u8]) -> Result<(), ConfigError> {
        if slot >= SCION_KEY_N {
            return Err(ConfigError::InvalidValue(format!(
                "key slot {slot} out of range (max {})",
                SCION_KEY_N - 1
            )));
        }
        let val = SymKey::new(key).ok_or_else(|| {
            ConfigError::InvalidValue(format!(
                "key length {} out of range (1..={SCION_KEY_MAX_LEN})",
                key.len()
            ))
        })?;
        self.slots[slot].store(Arc::new(val));
        info!(slot, len = key.len(), "scion key set");
        Ok(())
    }

    pub fn get(&self, slot: usize) -> Option<Arc<SymKey>> {
        self.slots.get(slot).map(|s| s.load_full())
    }

    /// The active hop-field MAC key (slot 0).
    pub fn hop_key(&self) -> Arc<SymKey> {
        self.slots[0].load_full()
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}
