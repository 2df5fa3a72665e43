//! Buffer handles and per-buffer metadata.

use alloc::boxed::Box;
use alloc::vec;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

/// Link value marking the end of a chain.
pub(crate) const END_OF_CHAIN: u16 = u16::MAX;

/// Index of one buffer within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferIndex(u16);

impl BufferIndex {
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_link(raw: u16) -> Option<Self> {
        (raw != END_OF_CHAIN).then_some(Self(raw))
    }

    pub(crate) fn to_link(index: Option<Self>) -> u16 {
        index.map_or(END_OF_CHAIN, |i| i.0)
    }
}

/// Storage and metadata of one buffer. The `used` flag lives in the pool's
/// slot allocator.
pub(crate) struct BufferSlot {
    valid_length: AtomicU32,
    next: AtomicU16,
    data: UnsafeCell<Box<[u8]>>,
}

impl BufferSlot {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            valid_length: AtomicU32::new(0),
            next: AtomicU16::new(END_OF_CHAIN),
            data: UnsafeCell::new(vec![0u8; size].into_boxed_slice()),
        }
    }

    pub(crate) fn reset(&self) {
        self.valid_length.store(0, Ordering::Relaxed);
        self.next.store(END_OF_CHAIN, Ordering::Relaxed);
    }

    pub(crate) fn valid_length(&self) -> usize {
        self.valid_length.load(Ordering::Acquire) as usize
    }

    pub(crate) fn set_valid_length(&self, len: usize) {
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        self.valid_length.store(len, Ordering::Release);
    }

    pub(crate) fn next(&self) -> Option<BufferIndex> {
        BufferIndex::from_link(self.next.load(Ordering::Acquire))
    }

    pub(crate) fn set_next(&self, next: Option<BufferIndex>) {
        self.next.store(BufferIndex::to_link(next), Ordering::Release);
    }

    /// # Safety
    /// No mutable reference to this buffer may be live.
    pub(crate) unsafe fn bytes(&self) -> &[u8] {
        &*self.data.get()
    }

    /// # Safety
    /// The caller must be the buffer's current owner and hold no other
    /// reference to it.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn bytes_mut(&self) -> &mut [u8] {
        &mut *self.data.get()
    }
}
