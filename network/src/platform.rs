//! OS services the driver core needs from its host.
//!
//! The core never talks to a scheduler or interrupt controller directly. An
//! RTOS port implements [`Platform`] with its own semaphores and IRQ masking;
//! bare-metal users can pair [`SpinSemaphore`](crate::sync::SpinSemaphore)
//! with a tick counter.

use crate::sync::Semaphore;

/// Host services: counting semaphores, a millisecond tick and IRQ masking.
pub trait Platform: Clone + Send + Sync {
    type Semaphore: Semaphore;

    /// New counting semaphore holding `initial` permits, capped at `limit`.
    fn semaphore(&self, initial: u32, limit: u32) -> Self::Semaphore;

    /// Monotonic milliseconds since an arbitrary epoch.
    fn now_ms(&self) -> u64;

    /// Run `f` with the MAC interrupt (or all interrupts) masked.
    fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R;
}
