//! Transmit contexts.
//!
//! One context per in-flight frame. A context is named by a [`TxToken`]
//! carrying its slot index and generation; every release bumps the
//! generation, so a token outliving its context (a completion arriving after
//! the timeout path reclaimed it) no longer matches and is ignored.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU16, Ordering};

use crate::dma::buffer::END_OF_CHAIN;
use crate::dma::{BufferIndex, SlotAllocator};
use crate::sync::Semaphore;
use crate::time::Timeout;

/// Identity of one transmit context allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxToken {
    index: u16,
    generation: u16,
}

impl TxToken {
    pub fn index(self) -> u16 {
        self.index
    }

    pub fn generation(self) -> u16 {
        self.generation
    }

    /// Packed form stored in descriptors.
    pub fn raw(self) -> u32 {
        (self.generation as u32) << 16 | self.index as u32
    }

    pub fn from_raw(raw: u32) -> Self {
        Self {
            index: raw as u16,
            generation: (raw >> 16) as u16,
        }
    }
}

impl fmt::Display for TxToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.index, self.generation)
    }
}

struct TxContext {
    generation: AtomicU16,
    head: AtomicU16,
}

/// Bounded pool of transmit contexts.
pub struct TxContextPool<S: Semaphore> {
    slots: SlotAllocator<S>,
    contexts: Box<[TxContext]>,
}

impl<S: Semaphore> TxContextPool<S> {
    /// `permits` must hold `count` permits, limit `count`.
    pub fn new(count: usize, permits: S) -> Self {
        let contexts: Vec<TxContext> = (0..count)
            .map(|_| TxContext {
                generation: AtomicU16::new(0),
                head: AtomicU16::new(END_OF_CHAIN),
            })
            .collect();
        Self {
            slots: SlotAllocator::new(count, permits),
            contexts: contexts.into_boxed_slice(),
        }
    }

    pub fn allocate(&self, timeout: Timeout) -> Option<TxToken> {
        let index = self.slots.allocate(timeout)?;
        let ctx = self.contexts.get(index as usize)?;
        ctx.head.store(END_OF_CHAIN, Ordering::Relaxed);
        Some(TxToken {
            index,
            generation: ctx.generation.load(Ordering::Acquire),
        })
    }

    fn live(&self, token: TxToken) -> Option<&TxContext> {
        let ctx = self.contexts.get(token.index as usize)?;
        (self.slots.is_used(token.index) && ctx.generation.load(Ordering::Acquire) == token.generation)
            .then_some(ctx)
    }

    pub fn is_live(&self, token: TxToken) -> bool {
        self.live(token).is_some()
    }

    /// Record the head of the context's buffer chain.
    pub fn set_head(&self, token: TxToken, head: BufferIndex) {
        if let Some(ctx) = self.live(token) {
            ctx.head.store(head.get(), Ordering::Relaxed);
        }
    }

    pub fn head(&self, token: TxToken) -> Option<BufferIndex> {
        BufferIndex::from_link(self.live(token)?.head.load(Ordering::Relaxed))
    }

    /// Free the context. Returns `false` if the token is stale.
    pub fn release(&self, token: TxToken) -> bool {
        let Some(ctx) = self.contexts.get(token.index as usize) else {
            return false;
        };
        if !self.slots.is_used(token.index) {
            return false;
        }
        let retired = ctx
            .generation
            .compare_exchange(
                token.generation,
                token.generation.wrapping_add(1),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        retired && self.slots.release(token.index)
    }

    pub fn in_use(&self) -> usize {
        self.slots.in_use()
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }
}
