use crate::error::PacketError;

use super::host::INVALID_SW_IF_INDEX;

/// Per-buffer flags word.
///
/// Mirrors the subset of host-framework buffer flags the stages consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufFlags(u32);

impl BufFlags {
    /// Packet trace requested for this buffer.
    pub const TRACED: BufFlags = BufFlags(1 << 0);
    /// The L4 checksum has already been validated (e.g. by NIC offload).
    pub const L4_CHECKSUM_COMPUTED: BufFlags = BufFlags(1 << 1);
    /// The validated L4 checksum was correct.
    pub const L4_CHECKSUM_CORRECT: BufFlags = BufFlags(1 << 2);

    pub fn contains(&self, other: BufFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: BufFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: BufFlags) {
        self.0 &= !other.0;
    }
}

/// One packet buffer owned by the worker currently processing it.
///
/// The cursor (`current()`) designates the header the next stage expects:
/// the bypass stage sees the IP header, the SCION stage the SCION common
/// header after `advance()`.
#[derive(Debug, Clone)]
pub struct PacketBuf {
    data: Vec<u8>,
    cur: usize,
    pub flags: BufFlags,
    /// Error recorded by the stage that routed this buffer to the drop node.
    pub error: Option<PacketError>,
    /// Logical receive interface, as issued by the host framework.
    pub rx_sw_if_index: u32,
}

impl PacketBuf {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            cur: 0,
            flags: BufFlags::default(),
            error: None,
            rx_sw_if_index: INVALID_SW_IF_INDEX,
        }
    }

    /// Bytes from the cursor to the end of the buffer.
    pub fn current(&self) -> &[u8] {
        &self.data[self.cur..]
    }

    pub fn current_len(&self) -> usize {
        self.data.len() - self.cur
    }

    /// Advance the cursor by `n` bytes, clamped to the buffer end.
    pub fn advance(&mut self, n: usize) {
        self.cur = (self.cur + n).min(self.data.len());
    }

    /// Cursor offset from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.cur
    }

    /// The whole buffer, independent of the cursor. Used by trace capture to
    /// look back at headers the cursor already passed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// A batch of packets handed to a stage by one worker.
pub type Frame = Vec<PacketBuf>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advances_and_clamps() {
        let mut b = PacketBuf::new(vec![0u8; 10]);
        assert_eq!(b.current_len(), 10);
        b.advance(4);
        assert_eq!(b.offset(), 4);
        assert_eq!(b.current_len(), 6);
        b.advance(100);
        assert_eq!(b.current_len(), 0);
        assert_eq!(b.as_bytes().len(), 10);
    }

    #[test]
    fn flag_operations() {
        let mut f = BufFlags::default();
        assert!(!f.contains(BufFlags::TRACED));
        f.insert(BufFlags::TRACED);
        f.insert(BufFlags::L4_CHECKSUM_COMPUTED);
        assert!(f.contains(BufFlags::TRACED));
        assert!(f.contains(BufFlags::L4_CHECKSUM_COMPUTED));
        f.remove(BufFlags::TRACED);
        assert!(!f.contains(BufFlags::TRACED));
    }
}
