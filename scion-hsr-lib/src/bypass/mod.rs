//! Underlay bypass stage: classify IP/UDP packets onto SCION interfaces.
//!
//! One stage instance per address family; both share the same logic through
//! [`IpFamily`].

mod checksum;
mod stage;

pub use checksum::{udp4_checksum, udp4_checksum_valid, udp6_checksum, udp6_checksum_valid};
pub use stage::BypassStage;

use crate::intf::{key4, key6, AddrFamily, ExternalParams, RegistryTables, UnderlayAddr};
use crate::packet::{Ipv4View, Ipv6View, UdpView};

/// Successor nodes of the bypass stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassNext {
    Drop,
    ScionInput,
}

impl BypassNext {
    pub fn label(&self) -> &'static str {
        match self {
            BypassNext::Drop => "error-drop",
            BypassNext::ScionInput => "scion-input",
        }
    }
}

/// Address-family specifics of the bypass stage.
///
/// Callers guarantee at least `HEADER_LEN + UDP + SCION common` bytes before
/// invoking any accessor; implementations still degrade to failing values on
/// short input rather than panicking.
pub trait IpFamily {
    const FAMILY: AddrFamily;
    const HEADER_LEN: usize;

    /// L4 protocol carried after the IP header.
    fn protocol(pkt: &[u8]) -> u8;

    /// IP payload length (bytes after the IP header) per the header fields.
    fn ip_payload_len(pkt: &[u8]) -> u16;

    /// Match `(dst, dst_port)` against the family's underlay table.
    fn match_intf(pkt: &[u8], udp: &UdpView, tables: &RegistryTables) -> Option<u32>;

    /// Whether `(src, src_port)` equals the interface's remote endpoint.
    fn src_matches(pkt: &[u8], udp: &UdpView, ext: &ExternalParams) -> bool;

    /// Validate the UDP checksum over the family's pseudo-header.
    fn udp_checksum_ok(pkt: &[u8]) -> bool;
}

/// IPv4 instantiation of the bypass stage.
pub struct Ipv4Underlay;

impl IpFamily for Ipv4Underlay {
    const FAMILY: AddrFamily = AddrFamily::V4;
    const HEADER_LEN: usize = Ipv4View::HEADER_LEN;

    fn protocol(pkt: &[u8]) -> u8 {
        Ipv4View::new(pkt).map_or(0, |ip| ip.protocol())
    }

    fn ip_payload_len(pkt: &[u8]) -> u16 {
        Ipv4View::new(pkt).map_or(0, |ip| {
            ip.total_len().saturating_sub(Self::HEADER_LEN as u16)
        })
    }

    fn match_intf(pkt: &[u8], udp: &UdpView, tables: &RegistryTables) -> Option<u32> {
        let ip = Ipv4View::new(pkt)?;
        tables.lookup_by_underlay4(key4(ip.dst(), udp.dst_port_net()))
    }

    fn src_matches(pkt: &[u8], udp: &UdpView, ext: &ExternalParams) -> bool {
        let Some(ip) = Ipv4View::new(pkt) else {
            return false;
        };
        ext.remote == UnderlayAddr::V4(ip.src()) && udp.src_port_net() == ext.remote_port_net
    }

    fn udp_checksum_ok(pkt: &[u8]) -> bool {
        udp4_checksum_valid(pkt)
    }
}

/// IPv6 instantiation of the bypass stage.
pub struct Ipv6Underlay;

impl IpFamily for Ipv6Underlay {
    const FAMILY: AddrFamily = AddrFamily::V6;
    const HEADER_LEN: usize = Ipv6View::HEADER_LEN;

    fn protocol(pkt: &[u8]) -> u8 {
        Ipv6View::new(pkt).map_or(0, |ip| ip.next_header())
    }

    fn ip_payload_len(pkt: &[u8]) -> u16 {
        Ipv6View::new(pkt).map_or(0, |ip| ip.payload_len())
    }

    fn match_intf(pkt: &[u8], udp: &UdpView, tables: &RegistryTables) -> Option<u32> {
        let ip = Ipv6View::new(pkt)?;
        tables.lookup_by_underlay6(key6(ip.dst(), udp.dst_port_net()))
    }

    fn src_matches(pkt: &[u8], udp: &UdpView, ext: &ExternalParams) -> bool {
        let Some(ip) = Ipv6View::new(pkt) else {
            return false;
        };
        ext.remote == UnderlayAddr::V6(ip.src()) && udp.src_port_net() == ext.remote_port_net
    }

    fn udp_checksum_ok(pkt: &[u8]) -> bool {
        udp6_checksum_valid(pkt)
    }
}
