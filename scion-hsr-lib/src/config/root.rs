use crate::intf::LinkTo;
use crate::packet::IsdAs;

use serde::Deserialize;
use std::net::IpAddr;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// The router's own ISD-AS, e.g. "1-ff00:0:110".
    /// Decides between transit (path update) and local delivery.
    pub local_isd_as: IsdAs,
    /// Symmetric key slots. Slot 0 is the active hop-field MAC key.
    #[serde(default)]
    pub keys: Vec<KeyConfig>,
    /// SCION interfaces created at startup.
    #[serde(default)]
    pub interfaces: Vec<IntfConfig>,
    /// Underlay interfaces on which the bypass feature is enabled.
    #[serde(default)]
    pub bypass: BypassConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// One key slot assignment.
#[derive(Debug, Deserialize, Clone)]
pub struct KeyConfig {
    /// Slot index, < SCION_KEY_N. Defaults to slot 0.
    #[serde(default)]
    pub slot: usize,
    /// Key bytes as a hex string, at most 32 bytes.
    pub hex: String,
}

/// One SCION interface definition.
///
/// `ifid` 0 (the default) creates the per-family internal interface; the
/// remote fields are then ignored. Any other ifid creates an external
/// interface and requires all remote fields.
#[derive(Debug, Deserialize, Clone)]
pub struct IntfConfig {
    #[serde(default)]
    pub ifid: u64,
    pub local: IpAddr,
    pub local_port: u16,
    pub remote: Option<IpAddr>,
    pub remote_port: Option<u16>,
    pub link_to: Option<LinkTo>,
    pub isd_as: Option<IsdAs>,
}

/// Underlay interfaces (framework sw-indices) to install the bypass feature
/// on, per address family.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BypassConfig {
    #[serde(default)]
    pub ip4: Vec<u32>,
    #[serde(default)]
    pub ip6: Vec<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter, e.g. "info" or "scion_hsr_lib=debug".
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Include the event target in log lines.
    #[serde(default)]
    pub show_target: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), show_target: false }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelemetryConfig {
    /// Port for the Prometheus /metrics endpoint. Disabled when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}
