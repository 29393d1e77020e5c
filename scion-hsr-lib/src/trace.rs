//! Per-packet structured trace records.
//!
//! Stages append a record for every buffer carrying the `TRACED` flag.
//! Records are fixed-size copies of the relevant header bytes; appending
//! never fails and never allocates per packet beyond the sink's vector.

use crate::bypass::BypassNext;
use crate::error::{BypassError, ScionError};
use crate::input::ScionNext;
use crate::intf::AddrFamily;
use crate::packet::{Ipv4View, Ipv6View, ScionHdrView, UdpView, COMMON_HDR_LEN, SCION_LINE_LEN};

use std::fmt;

/// Upper bound on SCION header bytes captured per trace record.
pub const SCION_MAX_TRACE: usize = 512;

const MAX_IP_HDR: usize = Ipv6View::HEADER_LEN;

/// Bypass-stage record: the IP and UDP headers as seen by the stage.
#[derive(Clone)]
pub struct BypassTrace {
    pub family: AddrFamily,
    pub next: BypassNext,
    pub error: Option<BypassError>,
    pub intf_index: Option<u32>,
    ip: [u8; MAX_IP_HDR],
    ip_len: usize,
    udp: [u8; UdpView::HEADER_LEN],
}

impl BypassTrace {
    pub fn capture(
        family: AddrFamily,
        next: BypassNext,
        error: Option<BypassError>,
        intf_index: Option<u32>,
        ip_bytes: &[u8],
        udp_bytes: &[u8],
    ) -> Self {
        let mut ip = [0u8; MAX_IP_HDR];
        let ip_len = ip_bytes.len().min(MAX_IP_HDR);
        ip[..ip_len].copy_from_slice(&ip_bytes[..ip_len]);
        let mut udp = [0u8; UdpView::HEADER_LEN];
        let udp_len = udp_bytes.len().min(UdpView::HEADER_LEN);
        udp[..udp_len].copy_from_slice(&udp_bytes[..udp_len]);
        Self { family, next, error, intf_index, ip, ip_len, udp }
    }
}

impl fmt::Display for BypassTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.intf_index {
            Some(i) => write!(f, "intf-index {i}, ")?,
            None => write!(f, "intf-index none, ")?,
        }
        write!(f, "next {}", self.next.label())?;
        if let Some(e) = self.error {
            write!(f, ", error {e}")?;
        }
        match self.family {
            AddrFamily::V4 => {
                if let Some(ip) = Ipv4View::new(&self.ip[..self.ip_len]) {
                    write!(f, "\n  {ip}")?;
                }
            }
            AddrFamily::V6 => {
                if let Some(ip) = Ipv6View::new(&self.ip[..self.ip_len]) {
                    write!(f, "\n  {ip}")?;
                }
            }
        }
        if let Some(udp) = UdpView::new(&self.udp) {
            write!(f, "\n  {udp}")?;
        }
        Ok(())
    }
}

/// SCION-input-stage record: the SCION header prefix.
#[derive(Clone)]
pub struct ScionTrace {
    pub next: ScionNext,
    pub error: Option<ScionError>,
    data: [u8; SCION_MAX_TRACE],
    data_len: usize,
}

impl ScionTrace {
    /// Capture from the buffer region at the cursor: the whole header when
    /// the common header is readable, else whatever bytes are present.
    pub fn capture(current: &[u8], next: ScionNext, error: Option<ScionError>) -> Self {
        let mut data_len = current.len().min(SCION_MAX_TRACE);
        if let Some(scion) = ScionHdrView::new(current) {
            data_len = data_len.min(usize::from(scion.header_len()) * SCION_LINE_LEN);
        }
        let mut data = [0u8; SCION_MAX_TRACE];
        data[..data_len].copy_from_slice(&current[..data_len]);
        Self { next, error, data, data_len }
    }
}

impl fmt::Display for ScionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "next {}", self.next.label())?;
        if let Some(e) = self.error {
            write!(f, ", error {e}")?;
        }
        let data = &self.data[..self.data_len];
        if self.data_len >= COMMON_HDR_LEN {
            if let Some(scion) = ScionHdrView::new(data) {
                return write!(f, "\n  {scion}");
            }
        }
        write!(f, "\n ")?;
        for b in data {
            write!(f, " {b:02x}")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub enum TraceRecord {
    Bypass(BypassTrace),
    Scion(ScionTrace),
}

impl From<BypassTrace> for TraceRecord {
    fn from(t: BypassTrace) -> Self {
        TraceRecord::Bypass(t)
    }
}

impl From<ScionTrace> for TraceRecord {
    fn from(t: ScionTrace) -> Self {
        TraceRecord::Scion(t)
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceRecord::Bypass(t) => t.fmt(f),
            TraceRecord::Scion(t) => t.fmt(f),
        }
    }
}

/// Per-worker trace sink. Writer-private, no synchronization.
#[derive(Default)]
pub struct TraceSink {
    records: Vec<TraceRecord>,
}

impl TraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: impl Into<TraceRecord>) {
        self.records.push(record.into());
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scion_trace_clamps_to_header() {
        let mut hdr = vec![0u8; 64];
        hdr[4] = 6; // header_len: 6 lines = 48 bytes
        let t = ScionTrace::capture(&hdr, ScionNext::Drop, Some(ScionError::Version));
        assert_eq!(t.data_len, 48);
        assert!(t.to_string().contains("error-drop"));
    }

    #[test]
    fn scion_trace_handles_short_buffers() {
        let t = ScionTrace::capture(&[0xab, 0xcd], ScionNext::Drop, Some(ScionError::TooShort));
        assert_eq!(t.data_len, 2);
        assert!(t.to_string().contains("ab cd"));
    }

    #[test]
    fn sink_accumulates() {
        let mut sink = TraceSink::new();
        sink.push(ScionTrace::capture(&[], ScionNext::PathUpdate, None));
        sink.push(ScionTrace::capture(&[], ScionNext::Drop, Some(ScionError::Version)));
        assert_eq!(sink.records().len(), 2);
        sink.clear();
        assert!(sink.records().is_empty());
    }
}
