//! Receive pipeline.
//!
//! Poll-based: `poll_receive` never blocks. It takes the next completed
//! descriptor chain off the ring, copies it into a packet from the network
//! stack's allocator, returns every chain buffer to the pool and refills the
//! ring.

use log::error;

use super::device::NetworkDeviceCore;
use super::traits::MacHardware;
use crate::dma::{BufferIndex, DescOwnership};
use crate::packet::{RxAllocator, RxPacket};
use crate::platform::Platform;
use crate::types::PtpTime;

/// One received frame as a linked chain of rx pool buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxChain {
    pub head: BufferIndex,
    pub segments: usize,
    /// Length reported by hardware on the last descriptor.
    pub frame_len: usize,
    pub timestamp: Option<PtpTime>,
    /// Hardware flagged a segment as errored.
    pub errored: bool,
}

impl<P: Platform, H: MacHardware> NetworkDeviceCore<P, H> {
    /// Reassemble the next received frame.
    ///
    /// # Returns
    /// - `Some(packet)`: frame copied out, chain buffers released
    /// - `None`: nothing ready, or the frame was dropped (counted)
    ///
    /// # Contract
    /// - MUST return immediately (no blocking)
    pub fn poll_receive<A: RxAllocator>(&self, alloc: &A) -> Option<A::Packet> {
        let packet = self.take_rx_chain().and_then(|chain| {
            let packet = self.copy_rx_chain(alloc, &chain);
            self.dma.rx_pool.release_chain(chain.head);
            packet
        });
        self.refill_rx();
        packet
    }

    /// Detach the oldest complete chain from the ring.
    ///
    /// A frame is ready once every descriptor up to and including one marked
    /// LAST is completed. Partially written frames stay on the ring.
    pub(super) fn take_rx_chain(&self) -> Option<RxChain> {
        let ring = &self.dma.rx_ring;
        let pool = &self.dma.rx_pool;

        let mut segments = 0;
        let mut terminated = false;
        for index in ring.pending_indices() {
            let desc = ring.get(index)?;
            if desc.ownership() != DescOwnership::CompletedAwaitingSoftware {
                break;
            }
            segments += 1;
            if desc.is_last() {
                terminated = true;
                break;
            }
        }
        // Hardware holds no armed descriptor and none can be armed: a frame
        // longer than the ring (or the pool) can never terminate. Drop what
        // hardware wrote so receive does not stall.
        let starved = ring.pending() == ring.capacity() || pool.available() == 0;
        let overrun = !terminated && segments > 0 && segments == ring.pending() && starved;
        if !terminated && !overrun {
            return None;
        }

        let mut head = None;
        let mut previous: Option<BufferIndex> = None;
        let mut frame_len = 0;
        let mut timestamp = None;
        let mut errored = overrun;
        for _ in 0..segments {
            let desc = ring.get(ring.tail())?;
            let buffer = desc.buffer();
            pool.set_valid_length(buffer, desc.len());
            pool.set_next(buffer, None);
            match previous {
                Some(prev) => pool.set_next(prev, Some(buffer)),
                None => head = Some(buffer),
            }
            previous = Some(buffer);

            errored |= desc.flags() & crate::dma::desc_flags::ERROR != 0;
            if desc.is_last() {
                frame_len = desc.frame_len();
                timestamp = desc.timestamp();
            }
            let _ = desc.reclaim();
            ring.advance_tail();
        }

        Some(RxChain {
            head: head?,
            segments,
            frame_len,
            timestamp,
            errored,
        })
    }

    fn copy_rx_chain<A: RxAllocator>(&self, alloc: &A, chain: &RxChain) -> Option<A::Packet> {
        let pool = &self.dma.rx_pool;

        if chain.errored {
            self.stats.rx_error();
            return None;
        }

        let total: usize = pool.chain(chain.head).map(|b| pool.valid_length(b)).sum();
        if total != chain.frame_len {
            error!(
                "eth: rx chain holds {} bytes, hardware reported {}",
                total, chain.frame_len
            );
            self.stats.rx_error();
            return None;
        }

        let Some(mut packet) = alloc.allocate(total) else {
            error!("eth: failed to obtain rx buffer for {} byte frame", total);
            self.stats.rx_drop();
            return None;
        };

        for buffer in pool.chain(chain.head) {
            // SAFETY: the descriptors were reclaimed, software owns the chain.
            let bytes = unsafe { pool.filled(buffer) }.unwrap_or(&[]);
            if let Err(e) = packet.append(bytes) {
                error!("eth: failed to append rx buffer: {}", e);
                self.stats.rx_drop();
                return None;
            }
        }

        if self.timestamping() {
            let stamp = chain
                .timestamp
                .or_else(|| self.clock.as_ref().map(|clock| clock.get()));
            if let Some(stamp) = stamp {
                packet.set_timestamp(stamp);
            }
        }

        Some(packet)
    }

    /// Arm every free descriptor with a fresh buffer.
    pub(super) fn refill_rx(&self) {
        let ring = &self.dma.rx_ring;
        let pool = &self.dma.rx_pool;

        let mut armed = 0;
        while ring.pending() < ring.capacity() && ring.head_is_free() {
            let Some(buffer) = pool.try_allocate() else {
                break;
            };
            if ring.push(buffer, pool.buffer_size(), 0, 0).is_err() {
                pool.release(buffer);
                break;
            }
            armed += 1;
        }

        if armed > 0 {
            self.hw.receive_demand();
        }
    }
}
