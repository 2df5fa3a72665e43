//! Exclusive section built on a binary semaphore.
//!
//! Unlike a spin lock the holder may sleep inside the section, which the
//! transmit path does while it waits for the hardware.

use super::Semaphore;
use crate::time::Timeout;

pub struct Section<S: Semaphore> {
    sem: S,
}

/// Leaves the section when dropped.
pub struct SectionGuard<'a, S: Semaphore> {
    sem: &'a S,
}

impl<S: Semaphore> Section<S> {
    /// `sem` must hold exactly one permit.
    pub fn new(sem: S) -> Self {
        Self { sem }
    }

    pub fn enter(&self) -> SectionGuard<'_, S> {
        while !self.sem.take(Timeout::Forever) {}
        SectionGuard { sem: &self.sem }
    }

    pub fn try_enter(&self) -> Option<SectionGuard<'_, S>> {
        self.sem
            .take(Timeout::NoWait)
            .then(|| SectionGuard { sem: &self.sem })
    }

    pub fn is_held(&self) -> bool {
        self.sem.count() == 0
    }
}

impl<S: Semaphore> Drop for SectionGuard<'_, S> {
    fn drop(&mut self) {
        self.sem.give();
    }
}
