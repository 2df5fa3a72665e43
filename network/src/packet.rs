//! Packet collaborators of the network stack.
//!
//! The core is unopinionated about packet objects. Transmit reads bytes out of
//! a [`TxPacket`]; receive asks an [`RxAllocator`] for a sized [`RxPacket`],
//! fills it, and the worker hands it to a [`FrameSink`]. [`Frame`] and
//! [`HeapAllocator`] are heap-backed implementations for stacks that just
//! want byte vectors.

use alloc::vec::Vec;
use thiserror::Error;

use crate::types::PtpTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("read of {len} bytes at offset {offset} past end of packet")]
    Truncated { offset: usize, len: usize },
    #[error("packet buffer full")]
    Overflow,
    #[error("network stack rejected the frame")]
    Rejected,
}

/// Outgoing packet.
pub trait TxPacket {
    /// Total frame length in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `out.len()` bytes starting at `offset`.
    fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<(), PacketError>;

    /// The caller wants an egress timestamp regardless of protocol.
    fn wants_timestamp(&self) -> bool {
        false
    }
}

impl TxPacket for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<(), PacketError> {
        let src = self
            .get(offset..offset + out.len())
            .ok_or(PacketError::Truncated { offset, len: out.len() })?;
        out.copy_from_slice(src);
        Ok(())
    }
}

/// Borrowed frame with an explicit timestamp request.
#[derive(Debug, Clone, Copy)]
pub struct TxFrame<'a> {
    bytes: &'a [u8],
    timestamp: bool,
}

impl<'a> TxFrame<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, timestamp: false }
    }

    pub fn with_timestamp(mut self) -> Self {
        self.timestamp = true;
        self
    }
}

impl TxPacket for TxFrame<'_> {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read_at(&self, offset: usize, out: &mut [u8]) -> Result<(), PacketError> {
        self.bytes.read_at(offset, out)
    }

    fn wants_timestamp(&self) -> bool {
        self.timestamp
    }
}

/// Packet buffer being filled by the receive pipeline.
pub trait RxPacket {
    /// Append one chain segment.
    fn append(&mut self, bytes: &[u8]) -> Result<(), PacketError>;

    fn set_timestamp(&mut self, timestamp: PtpTime);
}

/// Network-stack packet allocator: `allocate(length) -> packet | failure`.
pub trait RxAllocator {
    type Packet: RxPacket;

    fn allocate(&self, len: usize) -> Option<Self::Packet>;
}

/// Consumer of reassembled frames, in completion order.
pub trait FrameSink<P> {
    fn deliver(&self, packet: P) -> Result<(), PacketError>;
}

// ═══════════════════════════════════════════════════════════════════════════
// HEAP-BACKED IMPLEMENTATION
// ═══════════════════════════════════════════════════════════════════════════

/// Received frame in a heap vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    limit: usize,
    timestamp: Option<PtpTime>,
}

impl Frame {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn timestamp(&self) -> Option<PtpTime> {
        self.timestamp
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl RxPacket for Frame {
    fn append(&mut self, bytes: &[u8]) -> Result<(), PacketError> {
        if self.data.len() + bytes.len() > self.limit {
            return Err(PacketError::Overflow);
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn set_timestamp(&mut self, timestamp: PtpTime) {
        self.timestamp = Some(timestamp);
    }
}

/// Allocates [`Frame`]s from the global heap, failing rather than aborting
/// when memory runs out.
#[derive(Debug, Clone, Copy)]
pub struct HeapAllocator {
    max_len: usize,
}

impl HeapAllocator {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl RxAllocator for HeapAllocator {
    type Packet = Frame;

    fn allocate(&self, len: usize) -> Option<Frame> {
        if len > self.max_len {
            return None;
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        Some(Frame { data, limit: len, timestamp: None })
    }
}
