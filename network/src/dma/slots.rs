//! Lock-free slot allocation with a semaphore keyed to occupancy.
//!
//! Each slot carries a `used` flag that only moves unused→used through
//! [`SlotAllocator::allocate`] and used→unused through
//! [`SlotAllocator::release`]. The permit count of `permits` always equals the
//! number of unused slots not yet claimed, so a caller holding a permit is
//! guaranteed to find a slot. Exhaustion therefore blocks instead of failing.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::sync::Semaphore;
use crate::time::Timeout;

pub struct SlotAllocator<S: Semaphore> {
    used: Box<[AtomicBool]>,
    permits: S,
}

impl<S: Semaphore> SlotAllocator<S> {
    /// `permits` must start with `count` permits and a limit of `count`.
    pub fn new(count: usize, permits: S) -> Self {
        let used: Vec<AtomicBool> = (0..count).map(|_| AtomicBool::new(false)).collect();
        Self {
            used: used.into_boxed_slice(),
            permits,
        }
    }

    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    /// Claim a free slot, waiting up to `timeout` for one to be released.
    pub fn allocate(&self, timeout: Timeout) -> Option<u16> {
        if !self.permits.take(timeout) {
            return None;
        }
        Some(self.claim())
    }

    /// Claim a free slot without waiting.
    pub fn try_allocate(&self) -> Option<u16> {
        self.allocate(Timeout::NoWait)
    }

    // A permit guarantees a free slot exists, but a concurrent claimer may
    // take the one this scan was heading for, so rescan until one sticks.
    fn claim(&self) -> u16 {
        loop {
            for (index, used) in self.used.iter().enumerate() {
                if used
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    return index as u16;
                }
            }
            core::hint::spin_loop();
        }
    }

    /// Mark a slot unused. Returns `false` if it was not in use.
    pub fn release(&self, index: u16) -> bool {
        let Some(used) = self.used.get(index as usize) else {
            return false;
        };
        if used.swap(false, Ordering::AcqRel) {
            self.permits.give();
            true
        } else {
            false
        }
    }

    pub fn is_used(&self, index: u16) -> bool {
        self.used
            .get(index as usize)
            .is_some_and(|u| u.load(Ordering::Acquire))
    }

    pub fn in_use(&self) -> usize {
        self.used.iter().filter(|u| u.load(Ordering::Acquire)).count()
    }

    pub fn available(&self) -> usize {
        self.capacity() - self.in_use()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StdSemaphore;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::thread;

    fn allocator(count: usize) -> SlotAllocator<StdSemaphore> {
        SlotAllocator::new(count, StdSemaphore::new(count as u32, count as u32))
    }

    #[test]
    fn test_exhaust_and_release() {
        let slots = allocator(3);
        let a = slots.try_allocate().unwrap();
        let b = slots.try_allocate().unwrap();
        let c = slots.try_allocate().unwrap();
        assert_eq!(slots.try_allocate(), None);
        assert_eq!(slots.in_use(), 3);

        assert!(slots.release(b));
        assert_eq!(slots.try_allocate(), Some(b));
        assert!(slots.release(a));
        assert!(slots.release(c));
        assert_eq!(slots.in_use(), 1);
    }

    #[test]
    fn test_double_release_is_noop() {
        let slots = allocator(2);
        let a = slots.try_allocate().unwrap();
        assert!(slots.release(a));
        assert!(!slots.release(a));
        assert!(!slots.release(99));
        // Permits were not inflated by the bogus releases.
        assert!(slots.try_allocate().is_some());
        assert!(slots.try_allocate().is_some());
        assert!(slots.try_allocate().is_none());
    }

    #[test]
    fn test_allocate_times_out_when_exhausted() {
        let slots = allocator(1);
        let _held = slots.try_allocate().unwrap();
        let start = std::time::Instant::now();
        assert_eq!(slots.allocate(Timeout::from_millis(10)), None);
        assert!(start.elapsed() >= std::time::Duration::from_millis(10));
    }

    #[test]
    fn test_blocked_allocate_wakes_on_release() {
        let slots = Arc::new(allocator(1));
        let held = slots.try_allocate().unwrap();
        let waiter = {
            let slots = Arc::clone(&slots);
            thread::spawn(move || slots.allocate(Timeout::Forever))
        };
        thread::sleep(std::time::Duration::from_millis(5));
        slots.release(held);
        assert_eq!(waiter.join().unwrap(), Some(held));
    }

    #[test]
    fn test_no_double_allocation_under_contention() {
        let slots = Arc::new(allocator(4));
        let live = Arc::new(Mutex::new(HashSet::new()));

        let workers: Vec<_> = (0..6)
            .map(|_| {
                let slots = Arc::clone(&slots);
                let live = Arc::clone(&live);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let index = slots.allocate(Timeout::Forever).unwrap();
                        assert!(live.lock().unwrap().insert(index), "slot {} handed out twice", index);
                        thread::yield_now();
                        assert!(live.lock().unwrap().remove(&index));
                        assert!(slots.release(index));
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(slots.in_use(), 0);
    }
}
