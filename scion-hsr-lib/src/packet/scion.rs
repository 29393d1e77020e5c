use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Length of one path-header line in bytes.
pub const SCION_LINE_LEN: usize = 8;

/// Fixed SCION common header length: 8-byte prefix + dst/src ISD-AS.
pub const COMMON_HDR_LEN: usize = 24;

/// The only supported SCION version.
pub const SCION_VERSION: u8 = 0;

/// Hop-by-hop extension next-header value.
pub const SCION_HBH_EXT: u8 = 0;

/// End-to-end extension next-header value.
pub const SCION_E2E_EXT: u8 = 222;

const ADDR_TYPE_BITS: u16 = 6;
const ADDR_TYPE_MASK: u16 = (1 << ADDR_TYPE_BITS) - 1;

/// SCION host address types carried in the common header type fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrType {
    Ipv4,
    Ipv6,
    Svc,
}

impl AddrType {
    /// Decode a 6-bit wire value. `NONE` (0) and unassigned values are not
    /// acceptable host addresses and yield `None`.
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(AddrType::Ipv4),
            2 => Some(AddrType::Ipv6),
            3 => Some(AddrType::Svc),
            _ => None,
        }
    }

    /// Unpadded host address length in bytes.
    pub fn len(&self) -> usize {
        match self {
            AddrType::Ipv4 => 4,
            AddrType::Ipv6 => 16,
            AddrType::Svc => 2,
        }
    }

    pub const WIRE_IPV4: u8 = 1;
    pub const WIRE_IPV6: u8 = 2;
    pub const WIRE_SVC: u8 = 3;
}

/// ISD-AS identifier: 16-bit ISD in the top bits, 48-bit AS below.
///
/// Textual form is `isd-as`, where the AS prints as decimal when it fits in
/// 32 bits and as three 16-bit hex groups (`x:x:x`) otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IsdAs(pub u64);

impl IsdAs {
    const AS_MASK: u64 = (1 << 48) - 1;

    pub fn new(isd: u16, asn: u64) -> Self {
        Self(u64::from(isd) << 48 | (asn & Self::AS_MASK))
    }

    pub fn isd(&self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub fn asn(&self) -> u64 {
        self.0 & Self::AS_MASK
    }
}

impl fmt::Display for IsdAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let asn = self.asn();
        if asn >> 32 != 0 {
            write!(
                f,
                "{}-{:x}:{:x}:{:x}",
                self.isd(),
                (asn >> 32) & 0xffff,
                (asn >> 16) & 0xffff,
                asn & 0xffff
            )
        } else {
            write!(f, "{}-{}", self.isd(), asn)
        }
    }
}

impl FromStr for IsdAs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (isd_str, as_str) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid isd-as {s:?}: expected <isd>-<as>"))?;
        let isd: u16 = isd_str
            .parse()
            .map_err(|_| format!("invalid isd {isd_str:?}"))?;

        let asn = if as_str.contains(':') {
            let mut groups = as_str.split(':');
            let mut val: u64 = 0;
            for _ in 0..3 {
                let g = groups.next().ok_or_else(|| format!("invalid as {as_str:?}"))?;
                let g = u16::from_str_radix(g, 16).map_err(|_| format!("invalid as {as_str:?}"))?;
                val = val << 16 | u64::from(g);
            }
            if groups.next().is_some() {
                return Err(format!("invalid as {as_str:?}"));
            }
            val
        } else {
            let val: u64 = as_str.parse().map_err(|_| format!("invalid as {as_str:?}"))?;
            if val >> 32 != 0 {
                return Err(format!("decimal as {as_str:?} out of range, use x:x:x"));
            }
            val
        };

        Ok(IsdAs::new(isd, asn))
    }
}

impl Serialize for IsdAs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsdAs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// SCION service address: a 16-bit well-known value with a multicast bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvcAddr(pub u16);

impl SvcAddr {
    pub const MULTICAST: u16 = 1 << 15;

    pub fn is_multicast(&self) -> bool {
        self.0 & Self::MULTICAST != 0
    }

    fn kind_str(&self) -> &'static str {
        match self.0 & !Self::MULTICAST {
            0 => "BS",
            1 => "PS",
            2 => "CS",
            3 => "SB",
            4 => "SIG",
            _ => "?",
        }
    }
}

impl fmt::Display for SvcAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.is_multicast() { 'M' } else { 'A' };
        if self.kind_str() == "?" {
            write!(f, "Unknown({})", self.0)
        } else {
            write!(f, "{}_{}", self.kind_str(), tag)
        }
    }
}

/// Path info field: one 8-byte line heading a segment of hop fields.
#[derive(Debug, Clone, Copy)]
pub struct InfoField {
    pub flags: u8,
    ts: [u8; 4],
    pub isd: u16,
    pub hops: u8,
}

impl InfoField {
    pub const CONS_DIR: u8 = 1 << 0;
    pub const SHORTCUT: u8 = 1 << 1;
    pub const PEER: u8 = 1 << 2;

    pub fn parse(line: &[u8; 8]) -> Self {
        Self {
            flags: line[0],
            ts: [line[1], line[2], line[3], line[4]],
            isd: u16::from_be_bytes([line[5], line[6]]),
            hops: line[7],
        }
    }

    /// Segment creation timestamp, Unix seconds, host order.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes(self.ts)
    }

    /// Timestamp bytes exactly as on the wire, for MAC input construction.
    pub fn timestamp_wire(&self) -> [u8; 4] {
        self.ts
    }

    pub fn cons_dir(&self) -> bool {
        self.flags & Self::CONS_DIR != 0
    }
}

impl fmt::Display for InfoField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INFO flags: ")?;
        let mut any = false;
        for (bit, name) in [
            (Self::CONS_DIR, "cons-dir"),
            (Self::SHORTCUT, "shortcut"),
            (Self::PEER, "peer"),
        ] {
            if self.flags & bit != 0 {
                write!(f, "{name}, ")?;
                any = true;
            }
        }
        if !any {
            write!(f, "none, ")?;
        }
        write!(
            f,
            "isd {}, hops {}, secs since epoch: {}",
            self.isd,
            self.hops,
            self.timestamp()
        )
    }
}

/// Path hop field: one 8-byte line holding ingress/egress interfaces and a
/// truncated authentication tag.
#[derive(Debug, Clone, Copy)]
pub struct HopField {
    line: [u8; 8],
    value: u64,
}

impl HopField {
    pub const XOVER: u8 = 1 << 0;
    pub const VERIFY_ONLY: u8 = 1 << 1;

    pub fn parse(line: &[u8; 8]) -> Self {
        Self { line: *line, value: u64::from_be_bytes(*line) }
    }

    pub fn flags(&self) -> u8 {
        (self.value >> 56) as u8
    }

    pub fn exp_time(&self) -> u8 {
        (self.value >> 48) as u8
    }

    /// Ingress interface in construction direction (12 bits).
    pub fn cons_ingress(&self) -> u64 {
        (self.value >> 36) & 0xfff
    }

    /// Egress interface in construction direction (12 bits).
    pub fn cons_egress(&self) -> u64 {
        (self.value >> 24) & 0xfff
    }

    /// Interface the packet entered this AS on, given the segment direction.
    pub fn ingress(&self, cons_dir: bool) -> u64 {
        if cons_dir {
            self.cons_ingress()
        } else {
            self.cons_egress()
        }
    }

    /// Interface the packet leaves this AS on, given the segment direction.
    pub fn egress(&self, cons_dir: bool) -> u64 {
        if cons_dir {
            self.cons_egress()
        } else {
            self.cons_ingress()
        }
    }

    /// Truncated 24-bit MAC carried in the hop field.
    pub fn mac(&self) -> u32 {
        (self.value & 0xff_ffff) as u32
    }

    /// Wire bytes of the whole line; bytes 1..5 feed the MAC input.
    pub fn wire(&self) -> &[u8; 8] {
        &self.line
    }
}

impl fmt::Display for HopField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HOP flags: ")?;
        let mut any = false;
        for (bit, name) in [(Self::XOVER, "xover"), (Self::VERIFY_ONLY, "verify-only")] {
            if self.flags() & bit != 0 {
                write!(f, "{name}, ")?;
                any = true;
            }
        }
        if !any {
            write!(f, "none, ")?;
        }
        write!(
            f,
            "ExpTime {}, ConsIn {}, ConsEg {}, Mac {:x}",
            self.exp_time(),
            self.cons_ingress(),
            self.cons_egress(),
            self.mac()
        )
    }
}

/// View over a SCION header region: common header, host addresses and path.
///
/// `data` starts at the common header; the view only assumes the fixed 24
/// bytes are present, every further access is bounds-checked.
#[derive(Clone, Copy)]
pub struct ScionHdrView<'a> {
    data: &'a [u8],
}

impl<'a> ScionHdrView<'a> {
    pub fn new(data: &'a [u8]) -> Option<Self> {
        if data.len() < COMMON_HDR_LEN {
            return None;
        }
        Some(Self { data })
    }

    fn ver_dst_src(&self) -> u16 {
        u16::from_be_bytes([self.data[0], self.data[1]])
    }

    pub fn version(&self) -> u8 {
        (self.ver_dst_src() >> (2 * ADDR_TYPE_BITS)) as u8
    }

    pub fn dst_type_raw(&self) -> u8 {
        (self.ver_dst_src() & ADDR_TYPE_MASK) as u8
    }

    pub fn src_type_raw(&self) -> u8 {
        ((self.ver_dst_src() >> ADDR_TYPE_BITS) & ADDR_TYPE_MASK) as u8
    }

    pub fn dst_type(&self) -> Option<AddrType> {
        AddrType::from_wire(self.dst_type_raw())
    }

    pub fn src_type(&self) -> Option<AddrType> {
        AddrType::from_wire(self.src_type_raw())
    }

    /// Total packet length field, host order.
    pub fn total_len(&self) -> u16 {
        u16::from_be_bytes([self.data[2], self.data[3]])
    }

    /// Header length in 8-byte lines (common + addresses + path).
    pub fn header_len(&self) -> u8 {
        self.data[4]
    }

    /// Offset of the current info field, in 8-byte lines from the start.
    pub fn curr_infof(&self) -> u8 {
        self.data[5]
    }

    /// Offset of the current hop field, in 8-byte lines from the start.
    pub fn curr_hopf(&self) -> u8 {
        self.data[6]
    }

    pub fn next_header(&self) -> u8 {
        self.data[7]
    }

    pub fn dst_isdas(&self) -> IsdAs {
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.data[8..16]);
        IsdAs(u64::from_be_bytes(b))
    }

    pub fn src_isdas(&self) -> IsdAs {
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.data[16..24]);
        IsdAs(u64::from_be_bytes(b))
    }

    /// Combined dst+src host address length, padded to a line multiple.
    ///
    /// `None` when either type field does not name an acceptable host
    /// address (`NONE` included).
    pub fn addr_len(&self) -> Option<usize> {
        let dst = self.dst_type()?;
        let src = self.src_type()?;
        let len = dst.len() + src.len();
        Some((len + (SCION_LINE_LEN - 1)) & !(SCION_LINE_LEN - 1))
    }

    /// Destination host address bytes (unpadded), directly after the common
    /// header.
    pub fn dst_host(&self) -> Option<&'a [u8]> {
        let len = self.dst_type()?.len();
        self.data.get(COMMON_HDR_LEN..COMMON_HDR_LEN + len)
    }

    /// Source host address bytes (unpadded), after the destination address.
    pub fn src_host(&self) -> Option<&'a [u8]> {
        let start = COMMON_HDR_LEN + self.dst_type()?.len();
        let len = self.src_type()?.len();
        self.data.get(start..start + len)
    }

    /// Bounds-checked access to the 8-byte line at `idx` lines from the
    /// header start.
    pub fn line(&self, idx: usize) -> Option<&'a [u8; 8]> {
        let start = idx * SCION_LINE_LEN;
        self.data
            .get(start..start + SCION_LINE_LEN)
            .and_then(|s| s.try_into().ok())
    }

    /// Offset of the first path line, in lines. `None` for unacceptable
    /// address types.
    pub fn path_offset_lines(&self) -> Option<usize> {
        Some((COMMON_HDR_LEN + self.addr_len()?) / SCION_LINE_LEN)
    }

    fn fmt_host(&self, f: &mut fmt::Formatter<'_>, ty: Option<AddrType>, addr: Option<&[u8]>) -> fmt::Result {
        match (ty, addr) {
            (Some(AddrType::Ipv4), Some(a)) if a.len() == 4 => {
                write!(f, "{}", Ipv4Addr::new(a[0], a[1], a[2], a[3]))
            }
            (Some(AddrType::Ipv6), Some(a)) if a.len() == 16 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(a);
                write!(f, "{}", Ipv6Addr::from(b))
            }
            (Some(AddrType::Svc), Some(a)) if a.len() == 2 => {
                write!(f, "{}", SvcAddr(u16::from_be_bytes([a[0], a[1]])))
            }
            _ => write!(f, "Unknown"),
        }
    }
}

impl fmt::Display for ScionHdrView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proto {}: {},[", self.next_header(), self.src_isdas())?;
        self.fmt_host(f, self.src_type(), self.src_host())?;
        write!(f, "] -> {},[", self.dst_isdas())?;
        self.fmt_host(f, self.dst_type(), self.dst_host())?;
        writeln!(f, "]")?;
        writeln!(
            f,
            "  version {}, total-len {}B, header-len {}",
            self.version(),
            self.total_len(),
            self.header_len()
        )?;
        write!(
            f,
            "  current-info {}, current-hop {}",
            self.curr_infof(),
            self.curr_hopf()
        )?;

        // Path lines, segment by segment, bounded by what the buffer holds.
        let Some(first) = self.path_offset_lines() else {
            return Ok(());
        };
        let last = usize::from(self.header_len()).min(self.data.len() / SCION_LINE_LEN);
        let mut at = first;
        while at < last {
            let Some(line) = self.line(at) else { break };
            let infof = InfoField::parse(line);
            write!(f, "\n  {infof}")?;
            let seg_hops = usize::from(infof.hops).min(last - at - 1);
            for hop in 1..=seg_hops {
                let Some(line) = self.line(at + hop) else { break };
                write!(f, "\n    {}", HopField::parse(line))?;
            }
            at += 1 + usize::from(infof.hops);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isdas_split_and_join() {
        let ia = IsdAs::new(1, 0xff00_0000_0110);
        assert_eq!(ia.isd(), 1);
        assert_eq!(ia.asn(), 0xff00_0000_0110);
        assert_eq!(ia.to_string(), "1-ff00:0:110");
        assert_eq!("1-ff00:0:110".parse::<IsdAs>().map(|p| p.0), Ok(ia.0));
    }

    #[test]
    fn isdas_decimal_form() {
        let ia = IsdAs::new(3, 42);
        assert_eq!(ia.to_string(), "3-42");
        assert_eq!("3-42".parse::<IsdAs>().map(|p| p.0), Ok(ia.0));
    }

    #[test]
    fn isdas_rejects_garbage() {
        assert!("nope".parse::<IsdAs>().is_err());
        assert!("1-ff00:0".parse::<IsdAs>().is_err());
        assert!("1-ff00:0:110:9".parse::<IsdAs>().is_err());
        // decimal AS must fit in 32 bits; larger needs the hex form
        assert!("1-4294967296".parse::<IsdAs>().is_err());
    }

    #[test]
    fn addr_type_lengths() {
        assert_eq!(AddrType::from_wire(1), Some(AddrType::Ipv4));
        assert_eq!(AddrType::from_wire(2), Some(AddrType::Ipv6));
        assert_eq!(AddrType::from_wire(3), Some(AddrType::Svc));
        assert_eq!(AddrType::from_wire(0), None);
        assert_eq!(AddrType::from_wire(63), None);
        assert_eq!(AddrType::Ipv6.len(), 16);
    }

    #[test]
    fn hop_field_bit_layout() {
        // flags=0x01, exp_time=0x3f, cons_ingress=0x005, cons_egress=0x00a,
        // mac=0xabcdef
        let value: u64 = 0x01 << 56 | 0x3f << 48 | 0x005 << 36 | 0x00a << 24 | 0xabcdef;
        let hopf = HopField::parse(&value.to_be_bytes());
        assert_eq!(hopf.flags(), 0x01);
        assert_eq!(hopf.exp_time(), 0x3f);
        assert_eq!(hopf.cons_ingress(), 5);
        assert_eq!(hopf.cons_egress(), 10);
        assert_eq!(hopf.mac(), 0xabcdef);
        assert_eq!(hopf.ingress(true), 5);
        assert_eq!(hopf.ingress(false), 10);
        assert_eq!(hopf.egress(true), 10);
        assert_eq!(hopf.egress(false), 5);
    }

    #[test]
    fn info_field_layout() {
        let mut line = [0u8; 8];
        line[0] = InfoField::CONS_DIR;
        line[1..5].copy_from_slice(&1_700_000_000u32.to_be_bytes());
        line[5..7].copy_from_slice(&7u16.to_be_bytes());
        line[7] = 3;
        let infof = InfoField::parse(&line);
        assert!(infof.cons_dir());
        assert_eq!(infof.timestamp(), 1_700_000_000);
        assert_eq!(infof.isd, 7);
        assert_eq!(infof.hops, 3);
    }

    #[test]
    fn common_header_fields() {
        let mut hdr = vec![0u8; 40];
        // version 0, dst_type IPV4 (1), src_type IPV6 (2)
        let vds: u16 = (2 << 6) | 1;
        hdr[0..2].copy_from_slice(&vds.to_be_bytes());
        hdr[2..4].copy_from_slice(&40u16.to_be_bytes());
        hdr[4] = 5;
        hdr[5] = 3;
        hdr[6] = 4;
        hdr[7] = 17;
        hdr[8..16].copy_from_slice(&IsdAs::new(1, 10).0.to_be_bytes());
        hdr[16..24].copy_from_slice(&IsdAs::new(2, 20).0.to_be_bytes());

        let v = ScionHdrView::new(&hdr).expect("common header");
        assert_eq!(v.version(), 0);
        assert_eq!(v.dst_type(), Some(AddrType::Ipv4));
        assert_eq!(v.src_type(), Some(AddrType::Ipv6));
        assert_eq!(v.total_len(), 40);
        assert_eq!(v.header_len(), 5);
        assert_eq!(v.curr_infof(), 3);
        assert_eq!(v.curr_hopf(), 4);
        assert_eq!(v.next_header(), 17);
        assert_eq!(v.dst_isdas(), IsdAs::new(1, 10));
        assert_eq!(v.src_isdas(), IsdAs::new(2, 20));
        // 4 + 16 = 20, padded to 24
        assert_eq!(v.addr_len(), Some(24));
        assert_eq!(v.path_offset_lines(), Some(6));
    }

    #[test]
    fn addr_len_rejects_none_type() {
        let mut hdr = vec![0u8; 24];
        // dst_type NONE
        let vds: u16 = 2 << 6;
        hdr[0..2].copy_from_slice(&vds.to_be_bytes());
        let v = ScionHdrView::new(&hdr).expect("common header");
        assert_eq!(v.addr_len(), None);
    }

    #[test]
    fn svc_rendering() {
        assert_eq!(SvcAddr(0).to_string(), "BS_A");
        assert_eq!(SvcAddr(1 | SvcAddr::MULTICAST).to_string(), "PS_M");
        assert_eq!(SvcAddr(9).to_string(), "Unknown(9)");
    }
}
