mod loader;
mod root;

pub use loader::{decode_hex, load_from_path};
pub use root::{BypassConfig, Config, IntfConfig, KeyConfig, LoggingConfig, TelemetryConfig};
