use thiserror::Error;

/// Errors raised by the underlay bypass stage.
///
/// These are recorded on the packet buffer and routed to the drop node; they
/// are never returned through `Result` on the dataplane.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassError {
    #[error("packet length < minimum length (IP + UDP + SCION)")]
    MinLength,

    #[error("bad ip header")]
    IpHeader,

    #[error("bad udp length")]
    UdpLength,

    #[error("bad udp checksum")]
    UdpChecksum,

    #[error("no interface match")]
    NoIntfMatch,
}

impl BypassError {
    /// Stable label used for the per-stage error counters.
    pub fn label(&self) -> &'static str {
        match self {
            BypassError::MinLength => "min_length",
            BypassError::IpHeader => "ip_header",
            BypassError::UdpLength => "udp_length",
            BypassError::UdpChecksum => "udp_checksum",
            BypassError::NoIntfMatch => "no_intf_match",
        }
    }

    pub const ALL: [BypassError; 5] = [
        BypassError::MinLength,
        BypassError::IpHeader,
        BypassError::UdpLength,
        BypassError::UdpChecksum,
        BypassError::NoIntfMatch,
    ];
}

/// Errors raised by the SCION header validation stage.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScionError {
    #[error("scion length < common header")]
    TooShort,

    #[error("bad version")]
    Version,

    #[error("scion length != total length")]
    BadLength,

    #[error("scion header length > scion length")]
    BadHeaderLength,

    #[error("scion path length < minimum path (info + 2 hops)")]
    BadPath,

    #[error("scion current hopf >= scion header length")]
    BadCurrentHopf,

    #[error("scion current info field >= current hop field")]
    BadCurrentInfofHopf,

    #[error("scion current info < common + address header length")]
    BadCurrentInfof,

    #[error("current hop field > current infof + infof hops")]
    HopfNotInSegment,

    #[error("hop field expired time")]
    HopfExpired,

    #[error("hop field ingress intf != received intf")]
    HopfBadIngressIntf,

    #[error("hop field bad MAC")]
    HopfBadMac,
}

impl ScionError {
    /// Stable label used for the per-stage error counters.
    pub fn label(&self) -> &'static str {
        match self {
            ScionError::TooShort => "too_short",
            ScionError::Version => "version",
            ScionError::BadLength => "bad_length",
            ScionError::BadHeaderLength => "bad_header_length",
            ScionError::BadPath => "bad_path",
            ScionError::BadCurrentHopf => "bad_current_hopf",
            ScionError::BadCurrentInfofHopf => "bad_current_infof_hopf",
            ScionError::BadCurrentInfof => "bad_current_infof",
            ScionError::HopfNotInSegment => "hopf_not_in_segment",
            ScionError::HopfExpired => "hopf_expired",
            ScionError::HopfBadIngressIntf => "hopf_bad_ingress_intf",
            ScionError::HopfBadMac => "hopf_bad_mac",
        }
    }

    pub const ALL: [ScionError; 12] = [
        ScionError::TooShort,
        ScionError::Version,
        ScionError::BadLength,
        ScionError::BadHeaderLength,
        ScionError::BadPath,
        ScionError::BadCurrentHopf,
        ScionError::BadCurrentInfofHopf,
        ScionError::BadCurrentInfof,
        ScionError::HopfNotInSegment,
        ScionError::HopfExpired,
        ScionError::HopfBadIngressIntf,
        ScionError::HopfBadMac,
    ];
}

/// Error recorded on a packet buffer when a stage routes it to the drop node.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error(transparent)]
    Bypass(#[from] BypassError),

    #[error(transparent)]
    Scion(#[from] ScionError),
}

/// Errors returned by interface registry control-plane operations.
///
/// All variants are categorical and non-retryable; a failed operation leaves
/// no partial state behind.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("interface already exists")]
    IfAlreadyExists,

    #[error("local address/port already in use")]
    AddressInUse,

    #[error("local address/port not in use")]
    AddressNotInUse,

    #[error("no such interface")]
    NoSuchEntry,

    #[error("host framework registration failed")]
    InvalidRegistration,
}

/// Errors returned by configuration operations (`set_key`, config loading).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("failed to read config file: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Top-level error for control-plane callers (the daemon binary, tests).
#[derive(Error, Debug)]
pub enum Error {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("telemetry error: {0}")]
    Telemetry(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
