//! SCION header validation stage.
//!
//! Input precondition: the buffer cursor points at the SCION common header
//! and `rx_sw_if_index` names the SCION interface that accepted the packet.

use crate::crypto::{hopf_mac_input, HopfMacVerifier};
use crate::error::ScionError;
use crate::framework::{BufFlags, Frame, PacketBuf};
use crate::intf::{IntfRegistry, RegistryTables};
use crate::packet::{
    AddrType, HopField, InfoField, ScionHdrView, COMMON_HDR_LEN, SCION_HBH_EXT, SCION_LINE_LEN,
    SCION_VERSION,
};
use crate::telemetry::{Metrics, ScionCounters};
use crate::trace::{ScionTrace, TraceSink};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// One day in seconds: the maximum hop-field lifetime.
pub const MAX_TTL: u32 = 24 * 60 * 60;

/// Granularity of the hop-field `exp_time` value (~5m37s).
pub const EXP_TIME_UNIT: u32 = MAX_TTL / 256;

/// Successor nodes of the SCION input stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScionNext {
    Drop,
    ExtInput,
    PathUpdate,
    Ip4UdpInt,
    Ip6UdpInt,
}

impl ScionNext {
    pub fn label(&self) -> &'static str {
        match self {
            ScionNext::Drop => "error-drop",
            ScionNext::ExtInput => "scion-ext-input",
            ScionNext::PathUpdate => "scion-path-update",
            ScionNext::Ip4UdpInt => "scion-ip4-udp-int",
            ScionNext::Ip6UdpInt => "scion-ip6-udp-int",
        }
    }
}

/// Unix time in seconds, read once per frame and cached by the worker for
/// the duration of the batch.
pub fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// The SCION header validation stage.
pub struct ScionInputStage {
    registry: Arc<IntfRegistry>,
    counters: ScionCounters,
    local_isdas: Arc<AtomicU64>,
}

impl ScionInputStage {
    pub fn new(registry: Arc<IntfRegistry>, metrics: &Metrics, local_isdas: Arc<AtomicU64>) -> Self {
        Self {
            registry,
            counters: ScionCounters::new(metrics),
            local_isdas,
        }
    }

    /// Process one frame against a single time sample and registry snapshot.
    pub fn process_frame(
        &self,
        frame: &mut Frame,
        now: u32,
        mac: &mut HopfMacVerifier,
        traces: &mut TraceSink,
    ) -> Vec<ScionNext> {
        let tables = self.registry.load();
        frame
            .iter_mut()
            .map(|buf| self.process_one(&tables, buf, now, mac, traces))
            .collect()
    }

    pub fn process_one(
        &self,
        tables: &RegistryTables,
        buf: &mut PacketBuf,
        now: u32,
        mac: &mut HopfMacVerifier,
        traces: &mut TraceSink,
    ) -> ScionNext {
        let (next, error) = match self.check(tables, buf.current(), buf.rx_sw_if_index, now, mac) {
            Ok(next) => (next, None),
            Err(e) => {
                buf.error = Some(e.into());
                self.counters.error(e).inc();
                (ScionNext::Drop, Some(e))
            }
        };
        self.counters.dispatch(next).inc();
        if buf.flags.contains(BufFlags::TRACED) {
            traces.push(ScionTrace::capture(buf.current(), next, error));
        }
        next
    }

    fn check(
        &self,
        tables: &RegistryTables,
        cur: &[u8],
        rx_sw_if_index: u32,
        now: u32,
        mac: &mut HopfMacVerifier,
    ) -> Result<ScionNext, ScionError> {
        let scion = ScionHdrView::new(cur).ok_or(ScionError::TooShort)?;

        if scion.version() != SCION_VERSION {
            return Err(ScionError::Version);
        }
        let total_len = usize::from(scion.total_len());
        if cur.len() != total_len {
            return Err(ScionError::BadLength);
        }
        let addr_len = scion.addr_len().ok_or(ScionError::BadHeaderLength)?;
        let header_len = usize::from(scion.header_len());
        if header_len * SCION_LINE_LEN > total_len {
            return Err(ScionError::BadHeaderLength);
        }
        // minimum path: one info field plus two hop fields
        let addr_lines = (COMMON_HDR_LEN + addr_len) / SCION_LINE_LEN;
        if header_len < addr_lines + 3 {
            return Err(ScionError::BadPath);
        }
        let curr_hopf = usize::from(scion.curr_hopf());
        let curr_infof = usize::from(scion.curr_infof());
        if curr_hopf >= header_len {
            return Err(ScionError::BadCurrentHopf);
        }
        if curr_infof >= curr_hopf {
            return Err(ScionError::BadCurrentInfofHopf);
        }
        if curr_infof < addr_lines {
            return Err(ScionError::BadCurrentInfof);
        }

        let infof = InfoField::parse(scion.line(curr_infof).ok_or(ScionError::BadCurrentInfof)?);
        let hopf = HopField::parse(scion.line(curr_hopf).ok_or(ScionError::BadCurrentHopf)?);

        if curr_hopf > curr_infof + usize::from(infof.hops) {
            return Err(ScionError::HopfNotInSegment);
        }

        let expiry = u64::from(infof.timestamp())
            + (u64::from(hopf.exp_time()) + 1) * u64::from(EXP_TIME_UNIT);
        if expiry < u64::from(now) {
            return Err(ScionError::HopfExpired);
        }

        let rx = tables
            .lookup_by_sw_index(rx_sw_if_index)
            .and_then(|i| tables.intf(i))
            .ok_or(ScionError::HopfBadIngressIntf)?;
        if rx.ifid != 0 && hopf.ingress(infof.cons_dir()) != rx.ifid {
            return Err(ScionError::HopfBadIngressIntf);
        }

        let prev = prev_hopf(&scion, curr_infof, curr_hopf, &infof);
        let msg = hopf_mac_input(&infof, &hopf, prev.as_ref());
        if !mac.verify(&msg, hopf.mac()) {
            return Err(ScionError::HopfBadMac);
        }

        Ok(self.dispatch(&scion))
    }

    fn dispatch(&self, scion: &ScionHdrView<'_>) -> ScionNext {
        if scion.next_header() == SCION_HBH_EXT {
            ScionNext::ExtInput
        } else if scion.dst_isdas().0 != self.local_isdas.load(Ordering::Relaxed) {
            ScionNext::PathUpdate
        } else {
            match scion.dst_type() {
                Some(AddrType::Ipv4) => ScionNext::Ip4UdpInt,
                Some(AddrType::Ipv6) => ScionNext::Ip6UdpInt,
                // SVC delivery is reserved for future handling
                _ => ScionNext::Drop,
            }
        }
    }
}

/// The hop field to authenticate against, per the segment direction: the
/// previous hop in the direction of travel, absent when the current hop is
/// the segment's first (zero-filled in the MAC input).
fn prev_hopf(
    scion: &ScionHdrView<'_>,
    curr_infof: usize,
    curr_hopf: usize,
    infof: &InfoField,
) -> Option<HopField> {
    let prev = if infof.cons_dir() {
        curr_hopf.checked_sub(1)?
    } else {
        curr_hopf + 1
    };
    let lo = curr_infof + 1;
    let hi = curr_infof + usize::from(infof.hops);
    if prev < lo || prev > hi {
        return None;
    }
    Some(HopField::parse(scion.line(prev)?))
}
