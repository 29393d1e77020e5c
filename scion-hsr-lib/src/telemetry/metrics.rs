use crate::bypass::BypassNext;
use crate::error::{BypassError, ScionError};
use crate::input::ScionNext;
use crate::intf::AddrFamily;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Central metric families, created once per context.
///
/// Stages resolve their label values into plain `IntCounter` handles at
/// construction time, so a hot-path increment is a single atomic add.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bypass_errors: IntCounterVec,
    pub bypass_dispatch: IntCounterVec,
    pub scion_errors: IntCounterVec,
    pub scion_dispatch: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let bypass_errors = IntCounterVec::new(
            Opts::new("hsr_bypass_errors_total", "Packets dropped by the bypass stage, by error"),
            &["family", "error"],
        )?;
        registry.register(Box::new(bypass_errors.clone()))?;

        let bypass_dispatch = IntCounterVec::new(
            Opts::new("hsr_bypass_dispatch_total", "Packets dispatched by the bypass stage, by next node"),
            &["family", "next"],
        )?;
        registry.register(Box::new(bypass_dispatch.clone()))?;

        let scion_errors = IntCounterVec::new(
            Opts::new("hsr_scion_errors_total", "Packets dropped by the SCION input stage, by error"),
            &["error"],
        )?;
        registry.register(Box::new(scion_errors.clone()))?;

        let scion_dispatch = IntCounterVec::new(
            Opts::new("hsr_scion_dispatch_total", "Packets dispatched by the SCION input stage, by next node"),
            &["next"],
        )?;
        registry.register(Box::new(scion_dispatch.clone()))?;

        Ok(Self { registry, bypass_errors, bypass_dispatch, scion_errors, scion_dispatch })
    }

    /// Registry for the scrape endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Pre-resolved counter handles for one bypass stage instance.
pub(crate) struct BypassCounters {
    errors: [IntCounter; BypassError::ALL.len()],
    drop: IntCounter,
    scion_input: IntCounter,
}

impl BypassCounters {
    pub fn new(metrics: &Metrics, family: AddrFamily) -> Self {
        let errors = std::array::from_fn(|i| {
            metrics
                .bypass_errors
                .with_label_values(&[family.label(), BypassError::ALL[i].label()])
        });
        Self {
            errors,
            drop: metrics
                .bypass_dispatch
                .with_label_values(&[family.label(), BypassNext::Drop.label()]),
            scion_input: metrics
                .bypass_dispatch
                .with_label_values(&[family.label(), BypassNext::ScionInput.label()]),
        }
    }

    pub fn error(&self, error: BypassError) -> &IntCounter {
        let idx = match error {
            BypassError::MinLength => 0,
            BypassError::IpHeader => 1,
            BypassError::UdpLength => 2,
            BypassError::UdpChecksum => 3,
            BypassError::NoIntfMatch => 4,
        };
        &self.errors[idx]
    }

    pub fn dispatch(&self, next: BypassNext) -> &IntCounter {
        match next {
            BypassNext::Drop => &self.drop,
            BypassNext::ScionInput => &self.scion_input,
        }
    }
}

/// Pre-resolved counter handles for the SCION input stage.
pub(crate) struct ScionCounters {
    errors: [IntCounter; ScionError::ALL.len()],
    dispatch: [IntCounter; 5],
}

impl ScionCounters {
    pub fn new(metrics: &Metrics) -> Self {
        let errors = std::array::from_fn(|i| {
            metrics
                .scion_errors
                .with_label_values(&[ScionError::ALL[i].label()])
        });
        let nexts = [
            ScionNext::Drop,
            ScionNext::ExtInput,
            ScionNext::PathUpdate,
            ScionNext::Ip4UdpInt,
            ScionNext::Ip6UdpInt,
        ];
        let dispatch =
            std::array::from_fn(|i| metrics.scion_dispatch.with_label_values(&[nexts[i].label()]));
        Self { errors, dispatch }
    }

    pub fn error(&self, error: ScionError) -> &IntCounter {
        let idx = match error {
            ScionError::TooShort => 0,
            ScionError::Version => 1,
            ScionError::BadLength => 2,
            ScionError::BadHeaderLength => 3,
            ScionError::BadPath => 4,
            ScionError::BadCurrentHopf => 5,
            ScionError::BadCurrentInfofHopf => 6,
            ScionError::BadCurrentInfof => 7,
            ScionError::HopfNotInSegment => 8,
            ScionError::HopfExpired => 9,
            ScionError::HopfBadIngressIntf => 10,
            ScionError::HopfBadMac => 11,
        };
        &self.errors[idx]
    }

    pub fn dispatch(&self, next: ScionNext) -> &IntCounter {
        let idx = match next {
            ScionNext::Drop => 0,
            ScionNext::ExtInput => 1,
            ScionNext::PathUpdate => 2,
            ScionNext::Ip4UdpInt => 3,
            ScionNext::Ip6UdpInt => 4,
        };
        &self.dispatch[idx]
    }
}
