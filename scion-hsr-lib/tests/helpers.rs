//! Shared helpers: context setup and SCION-over-UDP packet builders.

use scion_hsr_lib::bypass::{udp4_checksum, udp6_checksum};
use scion_hsr_lib::crypto::{hopf_mac_input, HopfMacVerifier};
use scion_hsr_lib::framework::{Frame, InProcessHost, PacketBuf};
use scion_hsr_lib::packet::{AddrType, HopField, InfoField, IsdAs, IP_PROTO_UDP, SCION_LINE_LEN};
use scion_hsr_lib::{
    AddExternalArgs, AddIntfArgs, FastPath, LinkTo, ScionContext, WorkerState,
};

/// Underlay NIC handles packets arrive on (not SCION interfaces).
pub const NIC4_SW: u32 = 100;
pub const NIC6_SW: u32 = 101;

pub const HOP_KEY: [u8; 16] = [0x2b; 16];

pub fn local_isdas() -> IsdAs {
    IsdAs::new(1, 0xff00_0000_0110)
}

pub fn remote_isdas() -> IsdAs {
    IsdAs::new(1, 0xff00_0000_0111)
}

pub struct TestBed {
    pub ctx: ScionContext,
    pub fast: FastPath,
    pub worker: WorkerState,
}

/// Context with identity, hop key and bypass enabled on both NIC arcs.
pub fn testbed() -> TestBed {
    let ctx = ScionContext::new(Box::new(InProcessHost::new())).expect("context");
    ctx.set_local_isdas(local_isdas());
    ctx.set_key(0, &HOP_KEY).expect("hop key");
    ctx.set_bypass_enabled(NIC4_SW, scion_hsr_lib::AddrFamily::V4, true);
    ctx.set_bypass_enabled(NIC6_SW, scion_hsr_lib::AddrFamily::V6, true);
    let fast = ctx.fast_path();
    let worker = ctx.worker();
    TestBed { ctx, fast, worker }
}

pub fn add_internal(ctx: &ScionContext, local: &str, port: u16) -> u32 {
    ctx.add_interface(&AddIntfArgs {
        ifid: 0,
        local: local.parse().expect("addr"),
        local_port: port,
        external: None,
    })
    .expect("add internal interface")
}

pub fn add_external(
    ctx: &ScionContext,
    ifid: u64,
    local: &str,
    local_port: u16,
    remote: &str,
    remote_port: u16,
) -> u32 {
    ctx.add_interface(&AddIntfArgs {
        ifid,
        local: local.parse().expect("addr"),
        local_port,
        external: Some(AddExternalArgs {
            remote: remote.parse().expect("addr"),
            remote_port,
            link_to: LinkTo::Child,
            isd_as: remote_isdas(),
        }),
    })
    .expect("add external interface")
}

pub fn info_line(flags: u8, ts: u32, isd: u16, hops: u8) -> [u8; 8] {
    let mut line = [0u8; 8];
    line[0] = flags;
    line[1..5].copy_from_slice(&ts.to_be_bytes());
    line[5..7].copy_from_slice(&isd.to_be_bytes());
    line[7] = hops;
    line
}

pub fn hop_line(flags: u8, exp_time: u8, cons_in: u16, cons_eg: u16, mac: u32) -> [u8; 8] {
    let v: u64 = u64::from(flags) << 56
        | u64::from(exp_time) << 48
        | u64::from(cons_in & 0xfff) << 36
        | u64::from(cons_eg & 0xfff) << 24
        | u64::from(mac & 0xff_ffff);
    v.to_be_bytes()
}

/// A SCION header under construction. Field values default to a valid
/// single-segment packet; tests override what they need to break.
pub struct ScionPkt {
    pub version: u8,
    pub dst_type: u8,
    pub src_type: u8,
    pub dst_host: Vec<u8>,
    pub src_host: Vec<u8>,
    pub dst_isdas: IsdAs,
    pub src_isdas: IsdAs,
    pub next_header: u8,
    pub curr_infof: u8,
    pub curr_hopf: u8,
    pub path: Vec<[u8; 8]>,
    pub payload: Vec<u8>,
    pub total_len_override: Option<u16>,
    pub header_len_override: Option<u8>,
}

impl ScionPkt {
    /// Valid packet with IPv4 hosts, one segment (info + two hops), current
    /// hop = first hop in construction direction (no previous hop).
    pub fn valid(dst_isdas: IsdAs, now: u32) -> Self {
        let path = vec![
            info_line(InfoField::CONS_DIR, now.saturating_sub(60), 1, 2),
            hop_line(0, 63, 5, 6, 0),
            hop_line(0, 63, 7, 8, 0),
        ];
        Self {
            version: 0,
            dst_type: AddrType::WIRE_IPV4,
            src_type: AddrType::WIRE_IPV4,
            dst_host: vec![10, 0, 9, 9],
            src_host: vec![10, 0, 8, 8],
            dst_isdas,
            src_isdas: remote_isdas(),
            next_header: IP_PROTO_UDP,
            curr_infof: 4,
            curr_hopf: 5,
            path,
            payload: b"payload".to_vec(),
            total_len_override: None,
            header_len_override: None,
        }
    }

    fn padded_addr_len(&self) -> usize {
        let len = self.dst_host.len() + self.src_host.len();
        (len + (SCION_LINE_LEN - 1)) & !(SCION_LINE_LEN - 1)
    }

    pub fn first_path_line(&self) -> usize {
        (24 + self.padded_addr_len()) / SCION_LINE_LEN
    }

    /// Compute and patch the MAC of the hop at `curr_hopf`, using the same
    /// single-segment previous-hop rule the validator applies.
    pub fn seal_hop_mac(&mut self, mac: &mut HopfMacVerifier) {
        let first = self.first_path_line();
        let info_pos = usize::from(self.curr_infof) - first;
        let hop_pos = usize::from(self.curr_hopf) - first;
        let infof = InfoField::parse(&self.path[info_pos]);

        let prev_line = if infof.cons_dir() {
            usize::from(self.curr_hopf).wrapping_sub(1)
        } else {
            usize::from(self.curr_hopf) + 1
        };
        let lo = usize::from(self.curr_infof) + 1;
        let hi = usize::from(self.curr_infof) + usize::from(infof.hops);
        let prev = if (lo..=hi).contains(&prev_line) {
            self.path.get(prev_line - first).map(HopField::parse)
        } else {
            None
        };

        let cur = HopField::parse(&self.path[hop_pos]);
        let msg = hopf_mac_input(&infof, &cur, prev.as_ref());
        let tag = mac.tag24(&msg).expect("hop key installed");
        self.path[hop_pos][5] = (tag >> 16) as u8;
        self.path[hop_pos][6] = (tag >> 8) as u8;
        self.path[hop_pos][7] = tag as u8;
    }

    pub fn encode(&self) -> Vec<u8> {
        let addr_len = self.padded_addr_len();
        let header_bytes = 24 + addr_len + self.path.len() * SCION_LINE_LEN;
        let header_len = self
            .header_len_override
            .unwrap_or((header_bytes / SCION_LINE_LEN) as u8);
        let total_len = self
            .total_len_override
            .unwrap_or((header_bytes + self.payload.len()) as u16);

        let mut out = Vec::with_capacity(header_bytes + self.payload.len());
        let vds: u16 = u16::from(self.version) << 12
            | u16::from(self.src_type) << 6
            | u16::from(self.dst_type);
        out.extend_from_slice(&vds.to_be_bytes());
        out.extend_from_slice(&total_len.to_be_bytes());
        out.push(header_len);
        out.push(self.curr_infof);
        out.push(self.curr_hopf);
        out.push(self.next_header);
        out.extend_from_slice(&self.dst_isdas.0.to_be_bytes());
        out.extend_from_slice(&self.src_isdas.0.to_be_bytes());
        out.extend_from_slice(&self.dst_host);
        out.extend_from_slice(&self.src_host);
        let pad = addr_len - (self.dst_host.len() + self.src_host.len());
        out.extend(std::iter::repeat(0u8).take(pad));
        for line in &self.path {
            out.extend_from_slice(line);
        }
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Encapsulate `payload` in IPv4/UDP with consistent lengths and a valid
/// checksum.
pub fn wrap_udp4(
    src: [u8; 4],
    src_port: u16,
    dst: [u8; 4],
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let udp_len = (8 + payload.len()) as u16;

    let mut udp = Vec::with_capacity(usize::from(udp_len));
    udp.extend_from_slice(&src_port.to_be_bytes());
    udp.extend_from_slice(&dst_port.to_be_bytes());
    udp.extend_from_slice(&udp_len.to_be_bytes());
    udp.extend_from_slice(&[0, 0]);
    udp.extend_from_slice(payload);
    let csum = udp4_checksum(src, dst, &udp);
    udp[6..8].copy_from_slice(&csum.to_be_bytes());

    let mut pkt = vec![0u8; 20];
    pkt[0] = 0x45;
    pkt[2..4].copy_from_slice(&(20 + udp_len).to_be_bytes());
    pkt[8] = 64;
    pkt[9] = IP_PROTO_UDP;
    pkt[12..16].copy_from_slice(&src);
    pkt[16..20].copy_from_slice(&dst);
    pkt.extend_from_slice(&udp);
    pkt
}

/// IPv6 counterpart of [`wrap_udp4`].
pub fn wrap_udp6(
    src: [u8; 16],
    src_port: u16,
    dst: [u8; 16],
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let udp_len = (8 + payload.len()) as u16;

    let mut udp = Vec::with_capacity(usize::from(udp_len));
    udp.extend_from_slice(&src_port.to_be_bytes());
    udp.extend_from_slice(&dst_port.to_be_bytes());
    udp.extend_from_slice(&udp_len.to_be_bytes());
    udp.extend_from_slice(&[0, 0]);
    udp.extend_from_slice(payload);
    let csum = udp6_checksum(src, dst, &udp);
    udp[6..8].copy_from_slice(&csum.to_be_bytes());

    let mut pkt = vec![0u8; 40];
    pkt[0] = 0x60;
    pkt[4..6].copy_from_slice(&udp_len.to_be_bytes());
    pkt[6] = IP_PROTO_UDP;
    pkt[7] = 64;
    pkt[8..24].copy_from_slice(&src);
    pkt[24..40].copy_from_slice(&dst);
    pkt.extend_from_slice(&udp);
    pkt
}

/// Single-packet frame received on `nic`.
pub fn frame_of(pkt: Vec<u8>, nic: u32) -> Frame {
    let mut buf = PacketBuf::new(pkt);
    buf.rx_sw_if_index = nic;
    vec![buf]
}
