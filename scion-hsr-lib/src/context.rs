//! Process-wide SCION state and the control surface.
//!
//! The context is created once at startup and passed explicitly to whoever
//! needs it; there is no module-level singleton.

use crate::bypass::{BypassNext, BypassStage, IpFamily, Ipv4Underlay, Ipv6Underlay};
use crate::config::{decode_hex, Config};
use crate::crypto::{HopfMacVerifier, KeyStore};
use crate::error::{ConfigError, Error, Result};
use crate::framework::{FeatureArcs, Frame, InterfaceHost};
use crate::input::{ScionInputStage, ScionNext};
use crate::intf::{AddIntfArgs, AddrFamily, DelIntfArgs, IntfRegistry};
use crate::packet::IsdAs;
use crate::telemetry::Metrics;
use crate::trace::TraceSink;

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// The process-wide SCION context: interface registry, key slots, feature
/// arcs, counters and the router's own identity.
pub struct ScionContext {
    registry: Arc<IntfRegistry>,
    keys: Arc<KeyStore>,
    features: Arc<FeatureArcs>,
    metrics: Arc<Metrics>,
    local_isdas: Arc<AtomicU64>,
}

impl ScionContext {
    pub fn new(host: Box<dyn InterfaceHost + Send>) -> Result<Self> {
        Ok(Self {
            registry: Arc::new(IntfRegistry::new(host)),
            keys: Arc::new(KeyStore::new()),
            features: Arc::new(FeatureArcs::new()),
            metrics: Arc::new(Metrics::new()?),
            local_isdas: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn registry(&self) -> &Arc<IntfRegistry> {
        &self.registry
    }

    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    pub fn features(&self) -> &Arc<FeatureArcs> {
        &self.features
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Create an interface; returns the framework handle.
    pub fn add_interface(&self, args: &AddIntfArgs) -> Result<u32> {
        validate_intf_args(args)?;
        Ok(self.registry.add(args)?)
    }

    pub fn delete_interface(&self, args: &DelIntfArgs) -> Result<()> {
        Ok(self.registry.delete(args)?)
    }

    /// Replace the key in `slot` (< SCION_KEY_N, at most 32 bytes).
    pub fn set_key(&self, slot: usize, key: &[u8]) -> Result<()> {
        Ok(self.keys.set(slot, key)?)
    }

    /// Install or remove the bypass feature on an underlay interface's arc.
    /// Idempotent.
    pub fn set_bypass_enabled(&self, sw_if_index: u32, family: AddrFamily, enable: bool) {
        let changed = self.features.set_enabled(sw_if_index, family, enable);
        debug!(sw_if_index, family = family.label(), enable, changed, "bypass feature");
    }

    pub fn set_local_isdas(&self, isdas: IsdAs) {
        self.local_isdas.store(isdas.0, Ordering::Relaxed);
        info!(%isdas, "local isd-as set");
    }

    pub fn local_isdas(&self) -> IsdAs {
        IsdAs(self.local_isdas.load(Ordering::Relaxed))
    }

    /// Provision the context from a loaded configuration: identity, keys,
    /// interfaces, bypass arcs.
    pub fn apply_config(&self, cfg: &Config) -> Result<()> {
        self.set_local_isdas(cfg.local_isd_as);

        for key in &cfg.keys {
            let bytes = decode_hex(&key.hex)?;
            self.set_key(key.slot, &bytes)?;
        }

        for intf in &cfg.interfaces {
            let external = if intf.ifid != 0 {
                // presence was checked by the config loader
                match (intf.remote, intf.remote_port, intf.link_to, intf.isd_as) {
                    (Some(remote), Some(remote_port), Some(link_to), Some(isd_as)) => {
                        Some(crate::intf::AddExternalArgs { remote, remote_port, link_to, isd_as })
                    }
                    _ => {
                        return Err(Error::Config(ConfigError::InvalidValue(format!(
                            "ifid {}: missing external parameters",
                            intf.ifid
                        ))))
                    }
                }
            } else {
                None
            };
            self.add_interface(&AddIntfArgs {
                ifid: intf.ifid,
                local: intf.local,
                local_port: intf.local_port,
                external,
            })?;
        }

        for sw in &cfg.bypass.ip4 {
            self.set_bypass_enabled(*sw, AddrFamily::V4, true);
        }
        for sw in &cfg.bypass.ip6 {
            self.set_bypass_enabled(*sw, AddrFamily::V6, true);
        }

        Ok(())
    }

    /// Build the stage pipeline. Usually called once; stages are shared
    /// across workers.
    pub fn fast_path(&self) -> FastPath {
        FastPath {
            ip4_bypass: BypassStage::new(Arc::clone(&self.registry), &self.metrics),
            ip6_bypass: BypassStage::new(Arc::clone(&self.registry), &self.metrics),
            scion_input: ScionInputStage::new(
                Arc::clone(&self.registry),
                &self.metrics,
                Arc::clone(&self.local_isdas),
            ),
            registry: Arc::clone(&self.registry),
            features: Arc::clone(&self.features),
        }
    }

    /// Per-worker state, created once per worker thread at startup.
    pub fn worker(&self) -> WorkerState {
        WorkerState {
            mac: HopfMacVerifier::new(Arc::clone(&self.keys)),
            traces: TraceSink::new(),
        }
    }

    /// Human-readable dump of all configured interfaces.
    pub fn format_interfaces(&self) -> String {
        let tables = self.registry.load();
        if tables.is_empty() {
            return "No scion interfaces configured...".to_string();
        }
        let mut out = String::new();
        for (index, intf) in tables.iter() {
            let _ = writeln!(out, "[{index}] {intf}");
        }
        out
    }
}

fn validate_intf_args(args: &AddIntfArgs) -> Result<()> {
    if let Some(ext) = &args.external {
        if ext.remote.is_ipv4() != args.local.is_ipv4() {
            return Err(Error::Config(ConfigError::InvalidValue(
                "local and remote address families differ".to_string(),
            )));
        }
        if ext.remote == args.local {
            return Err(Error::Config(ConfigError::InvalidValue(
                "local and remote addresses are identical".to_string(),
            )));
        }
    }
    Ok(())
}

/// Per-worker, writer-private state: the keyed MAC context and trace
/// scratch. No synchronization on the hot path.
pub struct WorkerState {
    pub mac: HopfMacVerifier,
    pub traces: TraceSink,
}

/// Where a packet ends up after traversing the fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// The bypass feature is not enabled for the receive interface; the
    /// packet continues on the normal IP path untouched.
    IpLookup,
    Drop,
    ExtInput,
    PathUpdate,
    Ip4UdpInt,
    Ip6UdpInt,
}

impl From<ScionNext> for Terminal {
    fn from(next: ScionNext) -> Self {
        match next {
            ScionNext::Drop => Terminal::Drop,
            ScionNext::ExtInput => Terminal::ExtInput,
            ScionNext::PathUpdate => Terminal::PathUpdate,
            ScionNext::Ip4UdpInt => Terminal::Ip4UdpInt,
            ScionNext::Ip6UdpInt => Terminal::Ip6UdpInt,
        }
    }
}

/// The two-stage fast path, wired to one context.
///
/// A packet's traversal observes a single registry snapshot across both
/// stages.
pub struct FastPath {
    pub ip4_bypass: BypassStage<Ipv4Underlay>,
    pub ip6_bypass: BypassStage<Ipv6Underlay>,
    pub scion_input: ScionInputStage,
    registry: Arc<IntfRegistry>,
    features: Arc<FeatureArcs>,
}

impl FastPath {
    /// Run an IPv4 frame through the arc: bypass where enabled, then SCION
    /// validation for accepted packets.
    pub fn process_ip4_frame(
        &self,
        frame: &mut Frame,
        now: u32,
        worker: &mut WorkerState,
    ) -> Vec<Terminal> {
        self.run::<Ipv4Underlay>(&self.ip4_bypass, frame, now, worker)
    }

    /// IPv6 counterpart of [`process_ip4_frame`](Self::process_ip4_frame).
    pub fn process_ip6_frame(
        &self,
        frame: &mut Frame,
        now: u32,
        worker: &mut WorkerState,
    ) -> Vec<Terminal> {
        self.run::<Ipv6Underlay>(&self.ip6_bypass, frame, now, worker)
    }

    fn run<F: IpFamily>(
        &self,
        bypass: &BypassStage<F>,
        frame: &mut Frame,
        now: u32,
        worker: &mut WorkerState,
    ) -> Vec<Terminal> {
        let tables = self.registry.load();
        frame
            .iter_mut()
            .map(|buf| {
                if !self.features.is_enabled(buf.rx_sw_if_index, F::FAMILY) {
                    return Terminal::IpLookup;
                }
                match bypass.process_one(&tables, buf, &mut worker.traces) {
                    BypassNext::Drop => Terminal::Drop,
                    BypassNext::ScionInput => self
                        .scion_input
                        .process_one(&tables, buf, now, &mut worker.mac, &mut worker.traces)
                        .into(),
                }
            })
            .collect()
    }
}
