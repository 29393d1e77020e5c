use crate::intf::AddrFamily;

use ahash::RandomState;
use arc_swap::ArcSwap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

type SwSet = HashSet<u32, RandomState>;

/// Per-family bypass feature state on the IP unicast arcs.
///
/// Enable/disable is idempotent: repeated calls with the current state are
/// no-ops. Writers serialize behind a mutex; the dataplane reads a published
/// snapshot and never locks.
#[derive(Default)]
pub struct FeatureArcs {
    ip4: ArcSwap<SwSet>,
    ip6: ArcSwap<SwSet>,
    write: Mutex<()>,
}

impl FeatureArcs {
    pub fn new() -> Self {
        Self::default()
    }

    fn arc(&self, family: AddrFamily) -> &ArcSwap<SwSet> {
        match family {
            AddrFamily::V4 => &self.ip4,
            AddrFamily::V6 => &self.ip6,
        }
    }

    /// Install or remove the bypass feature for `sw_if_index` on the given
    /// arc. Returns whether the state changed.
    pub fn set_enabled(&self, sw_if_index: u32, family: AddrFamily, enable: bool) -> bool {
        let _guard = self.write.lock().expect("feature arc writer lock");
        let arc = self.arc(family);
        let cur = arc.load();
        if cur.contains(&sw_if_index) == enable {
            return false;
        }
        let mut next: SwSet = (**cur).clone();
        if enable {
            next.insert(sw_if_index);
        } else {
            next.remove(&sw_if_index);
        }
        arc.store(Arc::new(next));
        true
    }

    /// Whether packets received on `sw_if_index` flow through the bypass
    /// stage. Lock-free; intended for the per-frame dispatch path.
    pub fn is_enabled(&self, sw_if_index: u32, family: AddrFamily) -> bool {
        self.arc(family).load().contains(&sw_if_index)
    }
}
