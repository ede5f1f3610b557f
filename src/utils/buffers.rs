use bytes::{Bytes, BytesMut};
use smallvec::SmallVec;
use crate::types::PeerId;

/// Small collection that avoids allocations on the per-tick paths
pub type SmallPeerVec = SmallVec<[PeerId; 8]>;

/// Reusable buffer for frame serialization
pub struct PacketBuffer {
    buffer: BytesMut,
}

impl PacketBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn as_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Take the written bytes, keeping the allocation for the next frame
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new(1024)
    }
}
