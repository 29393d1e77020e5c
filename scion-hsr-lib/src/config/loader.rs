use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::crypto::{SCION_KEY_MAX_LEN, SCION_KEY_N};
use crate::error::ConfigError;

pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<Config, ConfigError> {
    let txt = fs::read_to_string(p).map_err(|e| ConfigError::Read(e.to_string()))?;
    let cfg: Config = toml::from_str(&txt).map_err(|e| ConfigError::Parse(e.to_string()))?;

    validate_config(&cfg)?;

    Ok(cfg)
}

/// Decode an even-length hex string.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, ConfigError> {
    if !s.is_ascii() {
        return Err(ConfigError::InvalidValue(format!("invalid hex string {s:?}")));
    }
    if s.len() % 2 != 0 {
        return Err(ConfigError::InvalidValue(format!(
            "hex string has odd length {}",
            s.len()
        )));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| ConfigError::InvalidValue(format!("invalid hex string {s:?}")))
        })
        .collect()
}

fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    for key in &cfg.keys {
        if key.slot >= SCION_KEY_N {
            return Err(ConfigError::InvalidValue(format!(
                "key slot {} out of range (max {})",
                key.slot,
                SCION_KEY_N - 1
            )));
        }
        let bytes = decode_hex(&key.hex)?;
        if bytes.is_empty() || bytes.len() > SCION_KEY_MAX_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "key slot {}: length {} out of range (1..={SCION_KEY_MAX_LEN})",
                key.slot,
                bytes.len()
            )));
        }
    }

    let mut underlays = HashSet::new();
    let mut ifids = HashSet::new();
    let mut internal_v4 = false;
    let mut internal_v6 = false;

    for intf in &cfg.interfaces {
        if !underlays.insert((intf.local, intf.local_port)) {
            return Err(ConfigError::InvalidValue(format!(
                "duplicate local endpoint {}:{}",
                intf.local, intf.local_port
            )));
        }

        if intf.ifid == 0 {
            let taken = if intf.local.is_ipv4() { &mut internal_v4 } else { &mut internal_v6 };
            if *taken {
                return Err(ConfigError::InvalidValue(
                    "more than one internal interface for the same address family".to_string(),
                ));
            }
            *taken = true;
            continue;
        }

        if !ifids.insert(intf.ifid) {
            return Err(ConfigError::InvalidValue(format!("duplicate ifid {}", intf.ifid)));
        }
        let (Some(remote), Some(_), Some(_), Some(_)) =
            (intf.remote, intf.remote_port, intf.link_to, intf.isd_as)
        else {
            return Err(ConfigError::InvalidValue(format!(
                "ifid {}: external interface requires remote, remote_port, link_to and isd_as",
                intf.ifid
            )));
        };
        if remote.is_ipv4() != intf.local.is_ipv4() {
            return Err(ConfigError::InvalidValue(format!(
                "ifid {}: local and remote address families differ",
                intf.ifid
            )));
        }
        if remote == intf.local {
            return Err(ConfigError::InvalidValue(format!(
                "ifid {}: local and remote addresses are identical",
                intf.ifid
            )));
        }
    }

    Ok(())
}
