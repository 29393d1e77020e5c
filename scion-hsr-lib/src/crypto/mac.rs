use super::keys::{KeyStore, SymKey};
use crate::packet::{HopField, InfoField};

use aes::{Aes128, Aes192, Aes256};
use cmac::{Cmac, Mac};
use std::sync::Arc;
use tracing::warn;

/// Length of the hop-field MAC input message.
pub const MAC_MSG_LEN: usize = 16;

/// Build the 16-byte message authenticated by the hop-field MAC.
///
/// ```text
///   0                   1                   2                   3
///   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  |                           Timestamp                           |
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  |       0       |    ExpTime    |      ConsIngress      |  ...  |
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///  | ...ConsEgress |                                               |
///  +-+-+-+-+-+-+-+-+                                               +
///  |                           PrevHopF                            |
///  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// All fields are taken verbatim from the wire. With no previous hop in the
/// segment, PrevHopF is zero-filled.
pub fn hopf_mac_input(infof: &InfoField, hopf: &HopField, prev: Option<&HopField>) -> [u8; MAC_MSG_LEN] {
    let mut msg = [0u8; MAC_MSG_LEN];
    msg[0..4].copy_from_slice(&infof.timestamp_wire());
    msg[5..9].copy_from_slice(&hopf.wire()[1..5]);
    if let Some(p) = prev {
        msg[9..16].copy_from_slice(&p.wire()[1..8]);
    }
    msg
}

/// A CMAC context keyed for the AES variant matching the key length.
enum KeyedCmac {
    Aes128(Cmac<Aes128>),
    Aes192(Cmac<Aes192>),
    Aes256(Cmac<Aes256>),
}

impl KeyedCmac {
    fn new(key: &[u8]) -> Option<Self> {
        match key.len() {
            16 => Cmac::<Aes128>::new_from_slice(key).ok().map(KeyedCmac::Aes128),
            24 => Cmac::<Aes192>::new_from_slice(key).ok().map(KeyedCmac::Aes192),
            32 => Cmac::<Aes256>::new_from_slice(key).ok().map(KeyedCmac::Aes256),
            _ => None,
        }
    }

    /// Full 16-byte tag over `msg`. Cloning the keyed context reuses the
    /// expanded key schedule, so no per-packet key setup happens here.
    fn tag(&self, msg: &[u8]) -> [u8; 16] {
        let bytes = match self {
            KeyedCmac::Aes128(ctx) => {
                let mut m = ctx.clone();
                m.update(msg);
                m.finalize().into_bytes()
            }
            KeyedCmac::Aes192(ctx) => {
                let mut m = ctx.clone();
                m.update(msg);
                m.finalize().into_bytes()
            }
            KeyedCmac::Aes256(ctx) => {
                let mut m = ctx.clone();
                m.update(msg);
                m.finalize().into_bytes()
            }
        };
        bytes.into()
    }
}

/// Per-worker hop-field MAC verifier.
///
/// Holds one long-lived keyed CMAC context; rebuilt only when the key store
/// publishes a new slot-0 key. Verification neither allocates nor locks.
pub struct HopfMacVerifier {
    keys: Arc<KeyStore>,
    cached: Arc<SymKey>,
    keyed: Option<KeyedCmac>,
}

impl HopfMacVerifier {
    pub fn new(keys: Arc<KeyStore>) -> Self {
        let cached = keys.hop_key();
        let keyed = Self::build(&cached);
        Self { keys, cached, keyed }
    }

    fn build(key: &SymKey) -> Option<KeyedCmac> {
        if key.is_unset() {
            return None;
        }
        let keyed = KeyedCmac::new(key.as_slice());
        if keyed.is_none() {
            warn!(
                len = key.as_slice().len(),
                "hop-field key length not usable for AES-CMAC; MAC checks will fail"
            );
        }
        keyed
    }

    /// Pick up a rekey if one was published since the last call.
    fn refresh(&mut self) {
        let current = self.keys.hop_key();
        if !Arc::ptr_eq(&current, &self.cached) {
            self.keyed = Self::build(&current);
            self.cached = current;
        }
    }

    /// Truncated 24-bit tag over `msg`: the last three tag bytes in wire
    /// order. `None` when no usable key is installed.
    pub fn tag24(&mut self, msg: &[u8; MAC_MSG_LEN]) -> Option<u32> {
        self.refresh();
        let keyed = self.keyed.as_ref()?;
        let tag = keyed.tag(msg);
        Some(u32::from_be_bytes([tag[12], tag[13], tag[14], tag[15]]) & 0xff_ffff)
    }

    /// Whether `expected` matches the truncated tag over `msg`. Fails closed
    /// when no usable key is installed.
    pub fn verify(&mut self, msg: &[u8; MAC_MSG_LEN], expected: u32) -> bool {
        self.tag24(msg) == Some(expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{HopField, InfoField};

    fn infof(ts: u32) -> InfoField {
        let mut line = [0u8; 8];
        line[0] = InfoField::CONS_DIR;
        line[1..5].copy_from_slice(&ts.to_be_bytes());
        line[7] = 2;
        InfoField::parse(&line)
    }

    fn hopf(bytes: [u8; 8]) -> HopField {
        HopField::parse(&bytes)
    }

    #[test]
    fn mac_input_layout() {
        let inf = infof(0x01020304);
        let cur = hopf([0xff, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
        let prev = hopf([0xee, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7]);

        let msg = hopf_mac_input(&inf, &cur, Some(&prev));
        assert_eq!(&msg[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(msg[4], 0);
        assert_eq!(&msg[5..9], &[0x11, 0x22, 0x33, 0x44]);
        assert_eq!(&msg[9..16], &[0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7]);

        let msg = hopf_mac_input(&inf, &cur, None);
        assert_eq!(&msg[9..16], &[0u8; 7]);
    }

    #[test]
    fn verify_round_trip() {
        let keys = Arc::new(KeyStore::new());
        keys.set(0, &[0x2b; 16]).expect("set key");
        let mut verifier = HopfMacVerifier::new(keys);

        let msg = hopf_mac_input(
            &infof(1_700_000_000),
            &hopf([0, 0x3f, 0, 0x50, 0x00, 0, 0, 0]),
            None,
        );
        let tag = verifier.tag24(&msg).expect("keyed");
        assert!(verifier.verify(&msg, tag));
        assert!(!verifier.verify(&msg, tag ^ 1));
    }

    #[test]
    fn fails_closed_without_key() {
        let keys = Arc::new(KeyStore::new());
        let mut verifier = HopfMacVerifier::new(keys);
        let msg = [0u8; MAC_MSG_LEN];
        assert_eq!(verifier.tag24(&msg), None);
        assert!(!verifier.verify(&msg, 0));
    }

    #[test]
    fn rekey_is_picked_up() {
        let keys = Arc::new(KeyStore::new());
        keys.set(0, &[0x11; 16]).expect("set key");
        let mut verifier = HopfMacVerifier::new(Arc::clone(&keys));

        let msg = [0x42u8; MAC_MSG_LEN];
        let tag_a = verifier.tag24(&msg).expect("keyed");

        keys.set(0, &[0x22; 16]).expect("rekey");
        let tag_b = verifier.tag24(&msg).expect("keyed");
        assert_ne!(tag_a, tag_b);
    }

    #[test]
    fn supports_aes256_keys() {
        let keys = Arc::new(KeyStore::new());
        keys.set(0, &[0x07; 32]).expect("set key");
        let mut verifier = HopfMacVerifier::new(keys);
        let msg = [0u8; MAC_MSG_LEN];
        let tag = verifier.tag24(&msg).expect("keyed");
        assert!(verifier.verify(&msg, tag));
    }
}
