//! Blocking primitives used by the data path.
//!
//! Pool exhaustion, the transmit completion wait and the worker's event wait
//! all block on a [`Semaphore`] rather than spinning. The exclusive transmit
//! section is a binary semaphore wrapped in an RAII guard.

pub mod section;
pub mod semaphore;

pub use section::{Section, SectionGuard};
pub use semaphore::{Semaphore, SpinSemaphore};
