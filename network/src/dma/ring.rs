//! Descriptor rings.
//!
//! Software model of the MAC's DMA descriptor lists. Every field is atomic so
//! the ring can be shared with the hardware side (a MAC HAL mirroring it into
//! real descriptors, or a simulator) without locks. The ownership tag is the
//! publication point: fields are written before `submit`/`complete` and read
//! after observing the new state.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use super::buffer::BufferIndex;
use super::ownership::{DescOwnership, OwnershipTag};
use crate::types::PtpTime;

// ═══════════════════════════════════════════════════════════════════════════
// FLAGS
// ═══════════════════════════════════════════════════════════════════════════

pub mod desc_flags {
    /// First segment of a frame.
    pub const FIRST: u32 = 1 << 0;
    /// Last segment of a frame.
    pub const LAST: u32 = 1 << 1;
    /// Transmit: capture an egress timestamp.
    pub const TIMESTAMP_REQUEST: u32 = 1 << 2;
    /// A timestamp was captured into the descriptor.
    pub const TIMESTAMP_VALID: u32 = 1 << 3;
    /// Hardware flagged the frame as errored.
    pub const ERROR: u32 = 1 << 4;
}

use desc_flags::*;

// ═══════════════════════════════════════════════════════════════════════════
// DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════

/// One hardware-visible descriptor.
#[derive(Debug, Default)]
pub struct Descriptor {
    owner: OwnershipTag,
    buffer: AtomicU16,
    len: AtomicU32,
    flags: AtomicU32,
    frame_len: AtomicU32,
    token: AtomicU32,
    ts_second: AtomicU64,
    ts_nanosecond: AtomicU32,
}

/// What the receive DMA writes back into a completed descriptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct RxCompletion {
    /// Bytes written into this descriptor's buffer.
    pub len: usize,
    pub first: bool,
    /// Total frame length, set on the last segment only.
    pub frame_len: Option<usize>,
    pub error: bool,
    pub timestamp: Option<PtpTime>,
}

impl Descriptor {
    pub fn ownership(&self) -> DescOwnership {
        self.owner.load()
    }

    pub fn buffer(&self) -> BufferIndex {
        BufferIndex::new(self.buffer.load(Ordering::Relaxed))
    }

    /// Segment length.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed) as usize
    }

    pub fn flags(&self) -> u32 {
        self.flags.load(Ordering::Relaxed)
    }

    pub fn is_first(&self) -> bool {
        self.flags() & FIRST != 0
    }

    pub fn is_last(&self) -> bool {
        self.flags() & LAST != 0
    }

    /// Frame length reported by hardware on the last receive segment.
    pub fn frame_len(&self) -> usize {
        self.frame_len.load(Ordering::Relaxed) as usize
    }

    /// Opaque value the submitter attached (transmit context token).
    pub fn token(&self) -> u32 {
        self.token.load(Ordering::Relaxed)
    }

    pub fn timestamp(&self) -> Option<PtpTime> {
        (self.flags() & TIMESTAMP_VALID != 0).then(|| PtpTime {
            second: self.ts_second.load(Ordering::Relaxed),
            nanosecond: self.ts_nanosecond.load(Ordering::Relaxed),
        })
    }

    fn store_timestamp(&self, flags: u32, timestamp: Option<PtpTime>) -> u32 {
        match timestamp {
            Some(ts) => {
                self.ts_second.store(ts.second, Ordering::Relaxed);
                self.ts_nanosecond.store(ts.nanosecond, Ordering::Relaxed);
                flags | TIMESTAMP_VALID
            }
            None => flags & !TIMESTAMP_VALID,
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // Hardware side
    // ───────────────────────────────────────────────────────────────────────

    /// Mark a transmit descriptor done. The timestamp is recorded only if
    /// the submitter requested one.
    ///
    /// Fails if software revoked the descriptor in the meantime.
    pub fn complete_transmit(&self, timestamp: Option<PtpTime>) -> Result<(), DescOwnership> {
        if self.ownership() != DescOwnership::SubmittedToHardware {
            return Err(self.ownership());
        }
        let flags = self.flags();
        let timestamp = timestamp.filter(|_| flags & TIMESTAMP_REQUEST != 0 && flags & LAST != 0);
        self.flags.store(self.store_timestamp(flags, timestamp), Ordering::Relaxed);
        self.owner.complete()
    }

    /// Write back a received segment and hand the descriptor to software.
    pub fn complete_receive(&self, completion: RxCompletion) -> Result<(), DescOwnership> {
        if self.ownership() != DescOwnership::SubmittedToHardware {
            return Err(self.ownership());
        }
        let mut flags = 0;
        if completion.first {
            flags |= FIRST;
        }
        if let Some(frame_len) = completion.frame_len {
            flags |= LAST;
            self.frame_len.store(frame_len as u32, Ordering::Relaxed);
        }
        if completion.error {
            flags |= ERROR;
        }
        self.len.store(completion.len as u32, Ordering::Relaxed);
        self.flags.store(self.store_timestamp(flags, completion.timestamp), Ordering::Relaxed);
        self.owner.complete()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Software side
    // ───────────────────────────────────────────────────────────────────────

    fn arm(&self, buffer: BufferIndex, len: usize, flags: u32, token: u32) -> Result<(), DescOwnership> {
        let state = self.ownership();
        if state != DescOwnership::Free {
            return Err(state);
        }
        self.buffer.store(buffer.get(), Ordering::Relaxed);
        self.len.store(len as u32, Ordering::Relaxed);
        self.flags.store(flags, Ordering::Relaxed);
        self.frame_len.store(0, Ordering::Relaxed);
        self.token.store(token, Ordering::Relaxed);
        self.owner.submit()
    }

    pub(crate) fn reclaim(&self) -> Result<(), DescOwnership> {
        self.owner.reclaim()
    }

    pub(crate) fn revoke(&self) -> Result<(), DescOwnership> {
        self.owner.revoke()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RING
// ═══════════════════════════════════════════════════════════════════════════

/// Circular descriptor list.
///
/// `head` is the next slot software submits into, `tail` the oldest slot not
/// yet retired, and `pending` the number of slots between them. Each ring has
/// a single software owner (the transmit section or the receive worker), so
/// the cursors need no synchronization beyond atomicity.
pub struct DescriptorRing {
    descriptors: Box<[Descriptor]>,
    head: AtomicUsize,
    tail: AtomicUsize,
    pending: AtomicUsize,
}

impl DescriptorRing {
    pub fn new(count: usize) -> Self {
        let descriptors: Vec<Descriptor> = (0..count).map(|_| Descriptor::default()).collect();
        Self {
            descriptors: descriptors.into_boxed_slice(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.descriptors.len()
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.descriptors.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }

    pub fn head(&self) -> usize {
        self.head.load(Ordering::Relaxed)
    }

    pub fn tail(&self) -> usize {
        self.tail.load(Ordering::Relaxed)
    }

    /// Slots submitted and not yet retired, whatever their current state.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Retire the slot at `tail`. Its descriptor must already be free.
    pub(crate) fn advance_tail(&self) {
        if self.pending() == 0 {
            return;
        }
        self.tail.store(self.next_index(self.tail()), Ordering::Relaxed);
        self.pending.fetch_sub(1, Ordering::Relaxed);
    }

    /// Indices of the pending slots, oldest first.
    pub fn pending_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let tail = self.tail();
        (0..self.pending()).map(move |i| (tail + i) % self.capacity())
    }

    /// Descriptors currently owned by hardware.
    pub fn hardware_owned(&self) -> usize {
        self.count(DescOwnership::SubmittedToHardware)
    }

    pub fn count(&self, state: DescOwnership) -> usize {
        self.iter().filter(|d| d.ownership() == state).count()
    }

    /// Arm the descriptor at `head` and hand it to hardware.
    ///
    /// Fails without side effects if that slot is not free (ring full).
    pub(crate) fn push(
        &self,
        buffer: BufferIndex,
        len: usize,
        flags: u32,
        token: u32,
    ) -> Result<usize, DescOwnership> {
        let index = self.head();
        if self.pending() == self.capacity() {
            return Err(self.descriptors[index].ownership());
        }
        self.descriptors[index].arm(buffer, len, flags, token)?;
        self.head.store(self.next_index(index), Ordering::Relaxed);
        self.pending.fetch_add(1, Ordering::Relaxed);
        Ok(index)
    }

    /// Whether the slot at `head` can take a submission.
    pub(crate) fn head_is_free(&self) -> bool {
        self.descriptors[self.head()].ownership() == DescOwnership::Free
    }
}
