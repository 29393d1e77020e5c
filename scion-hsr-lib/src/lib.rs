#![forbid(unsafe_code)]

pub mod bypass;
pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod framework;
pub mod input;
pub mod intf;
pub mod packet;
pub mod telemetry;
pub mod trace;

pub use config::{load_from_path, Config};
pub use context::{FastPath, ScionContext, Terminal, WorkerState};
pub use error::{BypassError, ConfigError, Error, RegistryError, Result, ScionError};
pub use input::now_secs;
pub use intf::{AddExternalArgs, AddIntfArgs, AddrFamily, DelIntfArgs, LinkTo};
pub use packet::IsdAs;
