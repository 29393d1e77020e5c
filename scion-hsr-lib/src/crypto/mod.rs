//! Symmetric key slots and hop-field MAC validation.

mod keys;
mod mac;

pub use keys::{KeyStore, SymKey, SCION_KEY_MAX_LEN, SCION_KEY_N};
pub use mac::{hopf_mac_input, HopfMacVerifier, MAC_MSG_LEN};
