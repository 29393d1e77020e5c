use super::{
    key4, key6, AddIntfArgs, AddrFamily, DelIntfArgs, ExternalParams, Ifid, ScionIntf,
    UnderlayAddr,
};
use crate::error::RegistryError;
use crate::framework::InterfaceHost;

use ahash::RandomState;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Immutable registry snapshot published to the dataplane.
///
/// The interface pool is an arena of stable indices; every derived table
/// stores the index only. A worker loads one snapshot per frame and never
/// observes a half-applied control-plane operation.
#[derive(Clone, Default)]
pub struct RegistryTables {
    intfs: Vec<Option<ScionIntf>>,
    free: Vec<u32>,
    by_key4: HashMap<u64, u32, RandomState>,
    by_key6: HashMap<(u64, u64, u64), u32, RandomState>,
    by_ifid: HashMap<Ifid, u32, RandomState>,
    by_sw_if_index: HashMap<u32, u32, RandomState>,
    int4: Option<u32>,
    int6: Option<u32>,
}

impl RegistryTables {
    /// Hot-path lookup for the IPv4 bypass stage. The key is built with
    /// [`key4`] from wire-order bytes.
    pub fn lookup_by_underlay4(&self, key: u64) -> Option<u32> {
        self.by_key4.get(&key).copied()
    }

    /// Hot-path lookup for the IPv6 bypass stage.
    pub fn lookup_by_underlay6(&self, key: (u64, u64, u64)) -> Option<u32> {
        self.by_key6.get(&key).copied()
    }

    /// Recover the interface of receipt from the buffer's logical receive
    /// interface.
    pub fn lookup_by_sw_index(&self, sw_if_index: u32) -> Option<u32> {
        self.by_sw_if_index.get(&sw_if_index).copied()
    }

    /// Control-plane lookup by SCION interface id. Ifid 0 resolves to the
    /// per-family internal interface.
    pub fn lookup_by_ifid(&self, ifid: Ifid, family: AddrFamily) -> Option<u32> {
        if ifid != 0 {
            self.by_ifid.get(&ifid).copied()
        } else {
            match family {
                AddrFamily::V4 => self.int4,
                AddrFamily::V6 => self.int6,
            }
        }
    }

    pub fn intf(&self, index: u32) -> Option<&ScionIntf> {
        self.intfs.get(index as usize).and_then(|s| s.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &ScionIntf)> {
        self.intfs
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|t| (i as u32, t)))
    }

    pub fn len(&self) -> usize {
        self.intfs.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn underlay_key_index(&self, addr: &UnderlayAddr, port_net: u16) -> Option<u32> {
        match addr {
            UnderlayAddr::V4(a) => self.lookup_by_underlay4(key4(*a, port_net)),
            UnderlayAddr::V6(a) => self.lookup_by_underlay6(key6(*a, port_net)),
        }
    }
}

/// Authoritative store of SCION interfaces.
///
/// Writers (control plane) serialize behind the host lock and publish a full
/// snapshot per mutation; readers (dataplane) load snapshots lock-free.
pub struct IntfRegistry {
    tables: ArcSwap<RegistryTables>,
    host: Mutex<Box<dyn InterfaceHost + Send>>,
}

impl IntfRegistry {
    pub fn new(host: Box<dyn InterfaceHost + Send>) -> Self {
        Self {
            tables: ArcSwap::from_pointee(RegistryTables::default()),
            host: Mutex::new(host),
        }
    }

    /// Current snapshot for a frame's worth of lookups.
    pub fn load(&self) -> Arc<RegistryTables> {
        self.tables.load_full()
    }

    /// Create an interface and return its framework handle.
    pub fn add(&self, args: &AddIntfArgs) -> Result<u32, RegistryError> {
        let local = UnderlayAddr::from(args.local);
        let family = local.family();
        let local_port_net = args.local_port.to_be();

        let mut host = self.host.lock().expect("interface host lock");
        let cur = self.tables.load_full();

        if cur.lookup_by_ifid(args.ifid, family).is_some() {
            return Err(RegistryError::IfAlreadyExists);
        }
        if cur.underlay_key_index(&local, local_port_net).is_some() {
            return Err(RegistryError::AddressInUse);
        }

        let mut next = (*cur).clone();
        let index = match next.free.pop() {
            Some(i) => i,
            None => {
                next.intfs.push(None);
                (next.intfs.len() - 1) as u32
            }
        };

        // Register with the host framework. On failure the cloned tables are
        // discarded, so no partial state is ever published.
        let sw_if_index = host
            .register(index)
            .map_err(|_| RegistryError::InvalidRegistration)?;

        let intf = ScionIntf {
            ifid: args.ifid,
            local,
            local_port_net,
            external: args.external.map(|e| ExternalParams {
                remote: UnderlayAddr::from(e.remote),
                remote_port_net: e.remote_port.to_be(),
                link_to: e.link_to,
                isd_as: e.isd_as,
            }),
            sw_if_index,
        };
        next.intfs[index as usize] = Some(intf);

        match local {
            UnderlayAddr::V4(a) => {
                next.by_key4.insert(key4(a, local_port_net), index);
            }
            UnderlayAddr::V6(a) => {
                next.by_key6.insert(key6(a, local_port_net), index);
            }
        }
        next.by_sw_if_index.insert(sw_if_index, index);
        if args.ifid != 0 {
            next.by_ifid.insert(args.ifid, index);
        } else {
            match family {
                AddrFamily::V4 => next.int4 = Some(index),
                AddrFamily::V6 => next.int6 = Some(index),
            }
        }

        host.set_admin_up(sw_if_index, true);
        self.tables.store(Arc::new(next));

        info!(
            ifid = args.ifid,
            local = %local,
            local_port = args.local_port,
            sw_if_index,
            "scion interface created"
        );
        Ok(sw_if_index)
    }

    /// Remove an interface and all its index entries.
    pub fn delete(&self, args: &DelIntfArgs) -> Result<(), RegistryError> {
        let local = UnderlayAddr::from(args.local);
        let family = local.family();
        let local_port_net = args.local_port.to_be();

        let mut host = self.host.lock().expect("interface host lock");
        let cur = self.tables.load_full();

        let index = cur
            .lookup_by_ifid(args.ifid, family)
            .ok_or(RegistryError::NoSuchEntry)?;
        if cur.underlay_key_index(&local, local_port_net) != Some(index) {
            return Err(RegistryError::AddressNotInUse);
        }

        let mut next = (*cur).clone();
        let intf = next.intfs[index as usize]
            .take()
            .ok_or(RegistryError::NoSuchEntry)?;

        host.set_admin_up(intf.sw_if_index, false);

        next.by_sw_if_index.remove(&intf.sw_if_index);
        match local {
            UnderlayAddr::V4(a) => {
                next.by_key4.remove(&key4(a, local_port_net));
            }
            UnderlayAddr::V6(a) => {
                next.by_key6.remove(&key6(a, local_port_net));
            }
        }
        if args.ifid != 0 {
            next.by_ifid.remove(&args.ifid);
        } else {
            match family {
                AddrFamily::V4 => next.int4 = None,
                AddrFamily::V6 => next.int6 = None,
            }
        }

        host.deregister(intf.sw_if_index);
        next.free.push(index);
        self.tables.store(Arc::new(next));

        info!(
            ifid = args.ifid,
            local = %local,
            local_port = args.local_port,
            "scion interface deleted"
        );
        Ok(())
    }
}
