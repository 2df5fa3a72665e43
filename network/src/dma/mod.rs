//! DMA buffer management module.
//!
//! Fixed-capacity buffer pools and descriptor rings shared between task
//! context and the hardware-event path.
//!
//! - [`BufferPool`]: fixed array of fixed-size buffers with `used`, length
//!   and chain-link metadata. Allocation blocks on a semaphore keyed to
//!   occupancy rather than failing.
//! - [`DescriptorRing`]: circular list of hardware-visible descriptors, each
//!   tagged with an atomic [`DescOwnership`].
//! - [`DmaArea`]: the four structures of one MAC, as the hardware sees them.
//!
//! Buffers are always named by [`BufferIndex`]. No slot identity is ever
//! recovered from an address.

pub mod buffer;
pub mod ownership;
pub mod pool;
pub mod region;
pub mod ring;
pub mod slots;

pub use buffer::BufferIndex;
pub use ownership::{DescOwnership, OwnershipTag};
pub use pool::BufferPool;
pub use region::DmaArea;
pub use ring::{desc_flags, Descriptor, DescriptorRing, RxCompletion};
pub use slots::SlotAllocator;
