//! Per-stage counters and the Prometheus scrape endpoint.

mod metrics;
mod server;

pub use metrics::Metrics;
pub(crate) use metrics::{BypassCounters, ScionCounters};
pub use server::start_metrics_server;
