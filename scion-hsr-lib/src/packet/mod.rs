//! Zero-copy wire views over the underlay and SCION headers.
//!
//! All multi-byte fields are big-endian on the wire. Accessors convert to
//! host order at the call site; raw-byte accessors are provided where the
//! consumer needs the wire representation (key packing, MAC input).

mod ip4;
mod ip6;
mod scion;
mod udp;

pub use ip4::Ipv4View;
pub use ip6::Ipv6View;
pub use scion::{
    AddrType, HopField, InfoField, IsdAs, ScionHdrView, SvcAddr, COMMON_HDR_LEN, SCION_E2E_EXT,
    SCION_HBH_EXT, SCION_LINE_LEN, SCION_VERSION,
};
pub use udp::UdpView;

/// IP protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;
