//! SCION interface model and registry.
//!
//! An interface represents one endpoint of the router on the underlay.
//! `ifid` 0 is the internal interface (one per address family, delivers to
//! local hosts); any other ifid peers with a remote border router.

mod registry;

pub use registry::{IntfRegistry, RegistryTables};

use crate::packet::IsdAs;

use serde::Deserialize;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// SCION interface id. 0 means internal.
pub type Ifid = u64;

/// Underlay address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrFamily {
    V4,
    V6,
}

impl AddrFamily {
    /// Stable label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AddrFamily::V4 => "ip4",
            AddrFamily::V6 => "ip6",
        }
    }
}

/// Underlay IP address kept as wire bytes, so hot-path key packing and
/// source comparison need no byte swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnderlayAddr {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl UnderlayAddr {
    pub fn family(&self) -> AddrFamily {
        match self {
            UnderlayAddr::V4(_) => AddrFamily::V4,
            UnderlayAddr::V6(_) => AddrFamily::V6,
        }
    }
}

impl From<IpAddr> for UnderlayAddr {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(a) => UnderlayAddr::V4(a.octets()),
            IpAddr::V6(a) => UnderlayAddr::V6(a.octets()),
        }
    }
}

impl fmt::Display for UnderlayAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnderlayAddr::V4(a) => write!(f, "{}", std::net::Ipv4Addr::from(*a)),
            UnderlayAddr::V6(a) => write!(f, "{}", std::net::Ipv6Addr::from(*a)),
        }
    }
}

/// Relationship of an external interface to the remote AS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkTo {
    Core,
    Parent,
    Child,
    Peer,
}

impl fmt::Display for LinkTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkTo::Core => "CORE",
            LinkTo::Parent => "PARENT",
            LinkTo::Child => "CHILD",
            LinkTo::Peer => "PEER",
        };
        write!(f, "{s}")
    }
}

impl FromStr for LinkTo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CORE" => Ok(LinkTo::Core),
            "PARENT" => Ok(LinkTo::Parent),
            "CHILD" => Ok(LinkTo::Child),
            "PEER" => Ok(LinkTo::Peer),
            _ => Err(format!("unknown link-to {s:?}")),
        }
    }
}

/// Peer endpoint parameters, present on external interfaces only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalParams {
    pub remote: UnderlayAddr,
    /// Network byte order.
    pub remote_port_net: u16,
    pub link_to: LinkTo,
    pub isd_as: IsdAs,
}

/// One SCION interface. Immutable after creation; removed only through
/// `delete_interface`.
///
/// `local`, `remote` and the port fields are stored in network byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScionIntf {
    pub ifid: Ifid,
    pub local: UnderlayAddr,
    /// Network byte order.
    pub local_port_net: u16,
    pub external: Option<ExternalParams>,
    /// Handle issued by the host framework; buffers accepted on this
    /// interface carry it as their logical receive interface.
    pub sw_if_index: u32,
}

impl ScionIntf {
    pub fn is_internal(&self) -> bool {
        self.ifid == 0
    }

    pub fn family(&self) -> AddrFamily {
        self.local.family()
    }
}

impl fmt::Display for ScionIntf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ifid {} local {} local-port {} sw-if-index {}",
            self.ifid,
            self.local,
            u16::from_be(self.local_port_net),
            self.sw_if_index
        )?;
        if let Some(ext) = &self.external {
            write!(
                f,
                "\n    remote {} remote-port {} link-to {} isd-as {}",
                ext.remote,
                u16::from_be(ext.remote_port_net),
                ext.link_to,
                ext.isd_as
            )?;
        }
        Ok(())
    }
}

/// External-side arguments for `add_interface`.
#[derive(Debug, Clone, Copy)]
pub struct AddExternalArgs {
    pub remote: IpAddr,
    pub remote_port: u16,
    pub link_to: LinkTo,
    pub isd_as: IsdAs,
}

/// Arguments for `add_interface`. Ports are host order; the registry
/// converts on insert.
#[derive(Debug, Clone, Copy)]
pub struct AddIntfArgs {
    pub ifid: Ifid,
    pub local: IpAddr,
    pub local_port: u16,
    pub external: Option<AddExternalArgs>,
}

/// Arguments for `delete_interface`.
#[derive(Debug, Clone, Copy)]
pub struct DelIntfArgs {
    pub ifid: Ifid,
    pub local: IpAddr,
    pub local_port: u16,
}

/// Pack an IPv4 underlay key: address in the high 32 bits, network-order
/// port zero-extended into the low bits.
pub fn key4(addr: [u8; 4], port_net: u16) -> u64 {
    u64::from(u32::from_ne_bytes(addr)) << 32 | u64::from(port_net)
}

/// Pack an IPv6 underlay key: two address words plus the network-order port.
pub fn key6(addr: [u8; 16], port_net: u16) -> (u64, u64, u64) {
    let mut hi = [0u8; 8];
    let mut lo = [0u8; 8];
    hi.copy_from_slice(&addr[0..8]);
    lo.copy_from_slice(&addr[8..16]);
    (
        u64::from_ne_bytes(hi),
        u64::from_ne_bytes(lo),
        u64::from(port_net),
    )
}
