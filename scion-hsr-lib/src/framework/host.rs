use crate::error::RegistryError;

use ahash::RandomState;
use std::collections::HashMap;

/// Sentinel for "no interface".
pub const INVALID_SW_IF_INDEX: u32 = u32::MAX;

/// The handle-issuing side of the host packet framework.
///
/// The registry registers every SCION interface with the host and tags
/// accepted buffers with the returned `sw_if_index`. Implementations may
/// fail registration; the registry rolls back and surfaces
/// `RegistryError::InvalidRegistration`.
pub trait InterfaceHost {
    /// Register a logical interface for the given registry slot and return
    /// the framework handle for it.
    fn register(&mut self, intf_index: u32) -> Result<u32, RegistryError>;

    /// Release a previously issued handle.
    fn deregister(&mut self, sw_if_index: u32);

    /// Set the admin state of a registered interface.
    fn set_admin_up(&mut self, sw_if_index: u32, up: bool);
}

/// In-process `InterfaceHost`: issues monotonically increasing handles and
/// tracks admin state. Stands in for the real framework in the daemon and in
/// tests.
#[derive(Default)]
pub struct InProcessHost {
    next: u32,
    admin_up: HashMap<u32, bool, RandomState>,
}

impl InProcessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, sw_if_index: u32) -> bool {
        self.admin_up.contains_key(&sw_if_index)
    }

    pub fn is_admin_up(&self, sw_if_index: u32) -> bool {
        self.admin_up.get(&sw_if_index).copied().unwrap_or(false)
    }
}

impl InterfaceHost for InProcessHost {
    fn register(&mut self, _intf_index: u32) -> Result<u32, RegistryError> {
        let sw_if_index = self.next;
        self.next += 1;
        self.admin_up.insert(sw_if_index, false);
        Ok(sw_if_index)
    }

    fn deregister(&mut self, sw_if_index: u32) {
        self.admin_up.remove(&sw_if_index);
    }

    fn set_admin_up(&mut self, sw_if_index: u32, up: bool) {
        if let Some(state) = self.admin_up.get_mut(&sw_if_index) {
            *state = up;
        }
    }
}
