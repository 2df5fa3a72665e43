//! Counting semaphore abstraction.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::time::Timeout;

/// Counting semaphore with a permit cap.
///
/// `give` may be called from interrupt context. `take` may suspend the
/// calling task for at most `timeout`.
pub trait Semaphore: Send + Sync {
    /// Add one permit unless already at the limit.
    fn give(&self);

    /// Take one permit. Returns `false` if the wait timed out.
    fn take(&self, timeout: Timeout) -> bool;

    /// Drop every pending permit.
    fn reset(&self);

    /// Permits currently available.
    fn count(&self) -> u32;
}

/// Busy-waiting semaphore for targets without a scheduler.
///
/// Waits are bounded by `ticks`, a millisecond counter supplied by the board.
pub struct SpinSemaphore {
    count: AtomicU32,
    limit: u32,
    ticks: fn() -> u64,
}

impl SpinSemaphore {
    pub const fn new(initial: u32, limit: u32, ticks: fn() -> u64) -> Self {
        let initial = if initial > limit { limit } else { initial };
        Self {
            count: AtomicU32::new(initial),
            limit,
            ticks,
        }
    }

    fn try_take(&self) -> bool {
        self.count
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |c| c.checked_sub(1))
            .is_ok()
    }
}

impl Semaphore for SpinSemaphore {
    fn give(&self) {
        let limit = self.limit;
        let _ = self
            .count
            .fetch_update(Ordering::Release, Ordering::Relaxed, |c| (c < limit).then(|| c + 1));
    }

    fn take(&self, timeout: Timeout) -> bool {
        let deadline = timeout.deadline((self.ticks)());
        loop {
            if self.try_take() {
                return true;
            }
            if let Some(deadline) = deadline {
                if deadline.expired((self.ticks)()) {
                    return false;
                }
            }
            core::hint::spin_loop();
        }
    }

    fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }
}
