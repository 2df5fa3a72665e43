//! Interrupt bridge.
//!
//! The interrupt handler turns MAC status into event tokens and posts them to
//! one [`EventChannel`]. No packet or buffer is touched in interrupt context.
//! The worker task is the single consumer and the only place that branches on
//! the kind of event.
//!
//! Tokens of the same kind coalesce: the channel is a pending-bit set plus a
//! wake semaphore, so it cannot overflow no matter how far the worker falls
//! behind. Ordering of frames is carried by the descriptor ring, not by the
//! channel.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::sync::Semaphore;
use crate::time::Timeout;

/// Event tokens, in the order the worker dispatches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// DMA or MAC error flags were raised.
    Fault,
    /// The transmit DMA finished a frame.
    TxComplete,
    /// The receive DMA completed at least one descriptor.
    RxAvailable,
    /// Stop the worker loop.
    Shutdown,
}

impl Event {
    pub const DISPATCH_ORDER: [Event; 4] =
        [Event::Fault, Event::TxComplete, Event::RxAvailable, Event::Shutdown];

    fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Set of pending tokens taken in one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSet(u32);

impl EventSet {
    pub fn contains(self, event: Event) -> bool {
        self.0 & event.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Pending events in dispatch order.
    pub fn iter(self) -> impl Iterator<Item = Event> {
        Event::DISPATCH_ORDER.into_iter().filter(move |e| self.contains(*e))
    }
}

pub struct EventChannel<S: Semaphore> {
    pending: AtomicU32,
    dma_faults: AtomicU32,
    mac_faults: AtomicU32,
    wake: S,
}

impl<S: Semaphore> EventChannel<S> {
    /// `wake` should start empty; a limit of one permit is enough.
    pub fn new(wake: S) -> Self {
        Self {
            pending: AtomicU32::new(0),
            dma_faults: AtomicU32::new(0),
            mac_faults: AtomicU32::new(0),
            wake,
        }
    }

    /// Post a token. Safe from interrupt context.
    pub fn post(&self, event: Event) {
        self.pending.fetch_or(event.bit(), Ordering::Release);
        self.wake.give();
    }

    /// Accumulate error flags and post [`Event::Fault`].
    pub fn post_fault(&self, dma: u32, mac: u32) {
        self.dma_faults.fetch_or(dma, Ordering::Relaxed);
        self.mac_faults.fetch_or(mac, Ordering::Relaxed);
        self.post(Event::Fault);
    }

    /// Wait for tokens and take all that are pending.
    pub fn wait(&self, timeout: Timeout) -> EventSet {
        if !self.wake.take(timeout) && self.pending.load(Ordering::Acquire) == 0 {
            return EventSet::default();
        }
        EventSet(self.pending.swap(0, Ordering::AcqRel))
    }

    /// Error flags accumulated since the last call, as `(dma, mac)`.
    pub fn take_faults(&self) -> (u32, u32) {
        (
            self.dma_faults.swap(0, Ordering::Relaxed),
            self.mac_faults.swap(0, Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StdSemaphore;
    use std::sync::Arc;
    use std::thread;

    fn channel() -> EventChannel<StdSemaphore> {
        EventChannel::new(StdSemaphore::new(0, 1))
    }

    #[test]
    fn test_tokens_coalesce_and_dispatch_in_order() {
        let events = channel();
        events.post(Event::RxAvailable);
        events.post(Event::RxAvailable);
        events.post(Event::TxComplete);
        events.post_fault(0x80, 0);

        let set = events.wait(Timeout::NoWait);
        let order: Vec<_> = set.iter().collect();
        assert_eq!(order, vec![Event::Fault, Event::TxComplete, Event::RxAvailable]);
        assert_eq!(events.take_faults(), (0x80, 0));
        assert_eq!(events.take_faults(), (0, 0));
        assert!(events.wait(Timeout::NoWait).is_empty());
    }

    #[test]
    fn test_wait_times_out_empty() {
        let events = channel();
        assert!(events.wait(Timeout::from_millis(5)).is_empty());
    }

    #[test]
    fn test_post_wakes_waiter() {
        let events = Arc::new(channel());
        let waiter = {
            let events = Arc::clone(&events);
            thread::spawn(move || events.wait(Timeout::Forever))
        };
        thread::sleep(std::time::Duration::from_millis(5));
        events.post(Event::Shutdown);
        assert!(waiter.join().unwrap().contains(Event::Shutdown));
    }
}
