//! DMA buffer pool.
//!
//! A fixed array of fixed-size buffers. The buffer count never changes after
//! construction. Allocation hands out a [`BufferIndex`] and release is safe
//! from the hardware-event path.

use alloc::boxed::Box;
use alloc::vec::Vec;
use log::warn;

use super::buffer::{BufferIndex, BufferSlot};
use super::slots::SlotAllocator;
use crate::sync::Semaphore;
use crate::time::Timeout;

/// Pool of fixed-size DMA buffers.
pub struct BufferPool<S: Semaphore> {
    slots: SlotAllocator<S>,
    buffers: Box<[BufferSlot]>,
    buffer_size: usize,
}

// SAFETY: buffer bytes are only reached through the unsafe accessors, whose
// callers must own the buffer. Metadata is atomic.
unsafe impl<S: Semaphore> Sync for BufferPool<S> {}

impl<S: Semaphore> BufferPool<S> {
    /// Create a pool of `count` buffers of `buffer_size` bytes.
    ///
    /// # Arguments
    /// - `permits`: semaphore holding `count` permits, limit `count`
    pub fn new(count: usize, buffer_size: usize, permits: S) -> Self {
        let buffers: Vec<BufferSlot> = (0..count).map(|_| BufferSlot::new(buffer_size)).collect();
        Self {
            slots: SlotAllocator::new(count, permits),
            buffers: buffers.into_boxed_slice(),
            buffer_size,
        }
    }

    /// Allocate a buffer, waiting up to `timeout` for one to free up.
    ///
    /// The buffer comes back with zero valid length and no successor.
    pub fn allocate(&self, timeout: Timeout) -> Option<BufferIndex> {
        let index = BufferIndex::new(self.slots.allocate(timeout)?);
        self.slot(index)?.reset();
        Some(index)
    }

    /// Allocate without waiting. Usable from any context.
    pub fn try_allocate(&self) -> Option<BufferIndex> {
        self.allocate(Timeout::NoWait)
    }

    /// Return a buffer to the pool. Contents are left untouched.
    pub fn release(&self, index: BufferIndex) {
        if !self.slots.release(index.get()) {
            warn!("eth: release of buffer {} which is not in use", index.get());
        }
    }

    /// Release every buffer of the chain starting at `head`.
    ///
    /// Returns the number of buffers released.
    pub fn release_chain(&self, head: BufferIndex) -> usize {
        // Read the link before releasing, another context may reuse the
        // buffer immediately.
        let mut released = 0;
        let mut cursor = Some(head);
        while let Some(index) = cursor {
            if released == self.capacity() {
                warn!("eth: buffer chain from {} does not terminate", head.get());
                break;
            }
            cursor = self.next(index);
            self.release(index);
            released += 1;
        }
        released
    }

    /// Buffers of the chain starting at `head`, in link order.
    pub fn chain(&self, head: BufferIndex) -> ChainIter<'_, S> {
        ChainIter {
            pool: self,
            cursor: Some(head),
            remaining: self.capacity(),
        }
    }

    pub fn is_used(&self, index: BufferIndex) -> bool {
        self.slots.is_used(index.get())
    }

    pub fn valid_length(&self, index: BufferIndex) -> usize {
        self.slot(index).map_or(0, BufferSlot::valid_length)
    }

    pub fn set_valid_length(&self, index: BufferIndex, len: usize) {
        if let Some(slot) = self.slot(index) {
            slot.set_valid_length(len.min(self.buffer_size));
        }
    }

    pub fn next(&self, index: BufferIndex) -> Option<BufferIndex> {
        self.slot(index)?.next()
    }

    pub fn set_next(&self, index: BufferIndex, next: Option<BufferIndex>) {
        if let Some(slot) = self.slot(index) {
            slot.set_next(next);
        }
    }

    /// Full capacity of a buffer.
    ///
    /// # Safety
    /// The caller must own the buffer (allocated it, or hardware completed
    /// the descriptor referencing it) and no mutable view may be live.
    pub unsafe fn bytes(&self, index: BufferIndex) -> Option<&[u8]> {
        Some(self.slot(index)?.bytes())
    }

    /// The first `valid_length` bytes of a buffer.
    ///
    /// # Safety
    /// Same as [`bytes`](Self::bytes).
    pub unsafe fn filled(&self, index: BufferIndex) -> Option<&[u8]> {
        let slot = self.slot(index)?;
        slot.bytes().get(..slot.valid_length())
    }

    /// Mutable view of a buffer.
    ///
    /// # Safety
    /// The caller must be the buffer's sole owner: software after allocate,
    /// or hardware while a descriptor referencing it is submitted.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn bytes_mut(&self, index: BufferIndex) -> Option<&mut [u8]> {
        Some(self.slot(index)?.bytes_mut())
    }

    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn in_use(&self) -> usize {
        self.slots.in_use()
    }

    pub fn available(&self) -> usize {
        self.slots.available()
    }

    fn slot(&self, index: BufferIndex) -> Option<&BufferSlot> {
        self.buffers.get(index.as_usize())
    }
}

/// Iterator over a buffer chain. Stops after `capacity` links so a corrupt
/// cycle cannot spin forever.
pub struct ChainIter<'a, S: Semaphore> {
    pool: &'a BufferPool<S>,
    cursor: Option<BufferIndex>,
    remaining: usize,
}

impl<S: Semaphore> Iterator for ChainIter<'_, S> {
    type Item = BufferIndex;

    fn next(&mut self) -> Option<BufferIndex> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.cursor?;
        self.remaining -= 1;
        self.cursor = self.pool.next(current);
        Some(current)
    }
}
