use super::{BypassNext, IpFamily};
use crate::error::BypassError;
use crate::framework::{BufFlags, Frame, PacketBuf};
use crate::intf::{IntfRegistry, RegistryTables};
use crate::packet::{UdpView, COMMON_HDR_LEN, IP_PROTO_UDP};
use crate::telemetry::{BypassCounters, Metrics};
use crate::trace::{BypassTrace, TraceSink};

use std::marker::PhantomData;
use std::sync::Arc;

/// The bypass stage for one address family.
///
/// Runs after the host's IP input stage on interfaces where the feature is
/// enabled. Packets matching a SCION interface are validated and handed to
/// the SCION input stage with the cursor advanced past IP+UDP; everything
/// else is dropped with the buffer error set.
pub struct BypassStage<F: IpFamily> {
    registry: Arc<IntfRegistry>,
    counters: BypassCounters,
    _family: PhantomData<F>,
}

impl<F: IpFamily> BypassStage<F> {
    pub fn new(registry: Arc<IntfRegistry>, metrics: &Metrics) -> Self {
        Self {
            registry,
            counters: BypassCounters::new(metrics, F::FAMILY),
            _family: PhantomData,
        }
    }

    /// Process one frame; returns the successor node per packet, in input
    /// order.
    pub fn process_frame(&self, frame: &mut Frame, traces: &mut TraceSink) -> Vec<BypassNext> {
        let tables = self.registry.load();
        frame
            .iter_mut()
            .map(|buf| self.process_one(&tables, buf, traces))
            .collect()
    }

    pub fn process_one(
        &self,
        tables: &RegistryTables,
        buf: &mut PacketBuf,
        traces: &mut TraceSink,
    ) -> BypassNext {
        let min_len = F::HEADER_LEN + UdpView::HEADER_LEN + COMMON_HDR_LEN;
        if buf.current_len() < min_len {
            return self.fail(buf, BypassError::MinLength, None, traces);
        }

        // All checks are evaluated independently; the reported error is
        // picked by the precedence ladder below.
        let flags = buf.flags;
        let (ip_err, udp_err, csum_err, computed_now, intf_index, validate_err, rx_sw) = {
            let pkt = buf.current();
            let Some(udp) = UdpView::new(&pkt[F::HEADER_LEN..]) else {
                return self.fail(buf, BypassError::MinLength, None, traces);
            };

            let ip_err = F::protocol(pkt) != IP_PROTO_UDP;
            let udp_err = udp.length() != F::ip_payload_len(pkt);

            let (csum_err, computed_now) = if flags.contains(BufFlags::L4_CHECKSUM_COMPUTED) {
                (!flags.contains(BufFlags::L4_CHECKSUM_CORRECT), None)
            } else {
                let ok = F::udp_checksum_ok(pkt);
                (!ok, Some(ok))
            };

            let intf_index = F::match_intf(pkt, &udp, tables);
            let (validate_err, rx_sw) = match intf_index.and_then(|i| tables.intf(i)) {
                None => (true, None),
                Some(intf) => {
                    let ok = match &intf.external {
                        // internal interface: no source endpoint check
                        None => true,
                        Some(ext) => F::src_matches(pkt, &udp, ext),
                    };
                    (!ok, Some(intf.sw_if_index))
                }
            };

            (ip_err, udp_err, csum_err, computed_now, intf_index, validate_err, rx_sw)
        };

        if let Some(ok) = computed_now {
            buf.flags.insert(BufFlags::L4_CHECKSUM_COMPUTED);
            if ok {
                buf.flags.insert(BufFlags::L4_CHECKSUM_CORRECT);
            }
        }

        if ip_err || udp_err || csum_err || validate_err {
            // precedence: IP_HEADER > UDP_LENGTH > UDP_CHECKSUM > NO_INTF_MATCH
            let error = if ip_err {
                BypassError::IpHeader
            } else if udp_err {
                BypassError::UdpLength
            } else if csum_err {
                BypassError::UdpChecksum
            } else {
                BypassError::NoIntfMatch
            };
            return self.fail(buf, error, intf_index, traces);
        }

        if let Some(sw) = rx_sw {
            buf.rx_sw_if_index = sw;
        }
        // scion-input expects the cursor at the SCION common header
        buf.advance(F::HEADER_LEN + UdpView::HEADER_LEN);
        self.counters.dispatch(BypassNext::ScionInput).inc();
        self.trace(buf, BypassNext::ScionInput, None, intf_index, traces);
        BypassNext::ScionInput
    }

    fn fail(
        &self,
        buf: &mut PacketBuf,
        error: BypassError,
        intf_index: Option<u32>,
        traces: &mut TraceSink,
    ) -> BypassNext {
        buf.error = Some(error.into());
        self.counters.error(error).inc();
        self.counters.dispatch(BypassNext::Drop).inc();
        self.trace(buf, BypassNext::Drop, Some(error), intf_index, traces);
        BypassNext::Drop
    }

    fn trace(
        &self,
        buf: &PacketBuf,
        next: BypassNext,
        error: Option<BypassError>,
        intf_index: Option<u32>,
        traces: &mut TraceSink,
    ) {
        if !buf.flags.contains(BufFlags::TRACED) {
            return;
        }
        // On success the cursor has moved past IP+UDP; look back for the
        // headers. On error it is still at the IP header.
        let ip_at = if error.is_none() {
            buf.offset().saturating_sub(F::HEADER_LEN + UdpView::HEADER_LEN)
        } else {
            buf.offset()
        };
        let bytes = buf.as_bytes();
        let ip = bytes.get(ip_at..).unwrap_or(&[]);
        let udp = bytes.get(ip_at + F::HEADER_LEN..).unwrap_or(&[]);
        traces.push(BypassTrace::capture(F::FAMILY, next, error, intf_index, ip, udp));
    }
}
