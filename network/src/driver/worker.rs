//! Worker task: the single consumer of the event channel.

use log::error;

use super::device::NetworkDeviceCore;
use super::irq::{Event, EventSet};
use super::traits::{dma_errors, MacHardware};
use crate::packet::{FrameSink, RxAllocator};
use crate::platform::Platform;
use crate::sync::Semaphore;
use crate::time::Timeout;

/// Outcome of one [`NetworkDeviceCore::dispatch_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The wait timed out with nothing pending.
    Idle,
    /// These tokens were handled.
    Handled(EventSet),
    /// Shutdown was requested. Other tokens in the same batch were handled.
    Shutdown,
}

impl<P: Platform, H: MacHardware> NetworkDeviceCore<P, H> {
    /// Run the worker until [`shutdown`](Self::shutdown) is called.
    pub fn run_worker<A, K>(&self, alloc: &A, sink: &K)
    where
        A: RxAllocator,
        K: FrameSink<A::Packet>,
    {
        while self.dispatch_once(alloc, sink, Timeout::Forever) != Dispatch::Shutdown {}
    }

    /// Wait up to `timeout` for event tokens and handle them.
    pub fn dispatch_once<A, K>(&self, alloc: &A, sink: &K, timeout: Timeout) -> Dispatch
    where
        A: RxAllocator,
        K: FrameSink<A::Packet>,
    {
        let events = self.events.wait(timeout);
        if events.is_empty() {
            return Dispatch::Idle;
        }

        for event in events.iter() {
            match event {
                Event::Fault => self.handle_fault(),
                Event::TxComplete => self.tx_done.give(),
                Event::RxAvailable => {
                    self.drain_receive(alloc, sink);
                }
                Event::Shutdown => return Dispatch::Shutdown,
            }
        }
        Dispatch::Handled(events)
    }

    /// Ask the worker loop to return.
    pub fn shutdown(&self) {
        self.events.post(Event::Shutdown);
    }

    /// Forward every ready frame, in ring order. Returns how many were
    /// delivered.
    pub fn drain_receive<A, K>(&self, alloc: &A, sink: &K) -> usize
    where
        A: RxAllocator,
        K: FrameSink<A::Packet>,
    {
        let mut delivered = 0;
        while let Some(packet) = self.poll_receive(alloc) {
            match sink.deliver(packet) {
                Ok(()) => {
                    self.stats.rx_frame();
                    delivered += 1;
                }
                Err(e) => {
                    error!("eth: network stack refused frame: {}", e);
                    self.stats.rx_error();
                }
            }
        }
        delivered
    }

    // Counted, never recovered here.
    fn handle_fault(&self) {
        let (dma, mac) = self.events.take_faults();
        self.stats.record_fault(dma, mac);
        if dma & dma_errors::FATAL_BUS_ERROR != 0 {
            error!("eth: fatal bus error, DMA engines halted");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CoreConfig;
    use crate::driver::traits::mac_errors;
    use crate::packet::HeapAllocator;
    use crate::testing::{started_core, CollectSink, WorkerThread};

    fn alloc() -> HeapAllocator {
        HeapAllocator::new(1524)
    }

    #[test]
    fn test_idle_and_shutdown() {
        let core = started_core(CoreConfig::default());
        let sink = CollectSink::default();
        assert_eq!(core.dispatch_once(&alloc(), &sink, Timeout::NoWait), Dispatch::Idle);

        core.shutdown();
        assert_eq!(core.dispatch_once(&alloc(), &sink, Timeout::NoWait), Dispatch::Shutdown);
    }

    #[test]
    fn test_dispatch_handles_every_token() {
        let core = started_core(CoreConfig::default());
        let sink = CollectSink::default();
        assert!(core.hardware().deliver_rx(core.dma(), &[0xAB; 64], None));
        core.hardware().raise(true, true, dma_errors::RX_BUFFER_UNAVAILABLE, mac_errors::LATE_COLLISION);
        core.handle_interrupt();

        let Dispatch::Handled(events) = core.dispatch_once(&alloc(), &sink, Timeout::NoWait) else {
            panic!("expected events");
        };
        assert_eq!(
            events.iter().collect::<Vec<_>>(),
            vec![Event::Fault, Event::TxComplete, Event::RxAvailable]
        );
        assert!(core.tx_signal_pending());
        assert_eq!(sink.frames().len(), 1);

        let stats = core.stats().snapshot();
        assert_eq!(stats.rx_frames, 1);
        assert_eq!(stats.rx_errors, 1);
        assert_eq!(stats.tx_errors, 1);
    }

    #[test]
    fn test_fatal_bus_error_only_counted() {
        let core = started_core(CoreConfig::default());
        core.hardware().raise(false, false, dma_errors::FATAL_BUS_ERROR, 0);
        core.handle_interrupt();

        let sink = CollectSink::default();
        assert!(matches!(
            core.dispatch_once(&alloc(), &sink, Timeout::NoWait),
            Dispatch::Handled(_)
        ));
        assert!(core.is_running());
        assert_eq!(core.stats().snapshot(), Default::default());
    }

    #[test]
    fn test_refused_frames_counted() {
        let core = started_core(CoreConfig::default());
        let sink = CollectSink::default();
        sink.refuse(true);
        for _ in 0..2 {
            assert!(core.hardware().deliver_rx(core.dma(), &[1; 60], None));
        }

        assert_eq!(core.drain_receive(&alloc(), &sink), 0);
        assert_eq!(core.stats().snapshot().rx_errors, 2);
        assert_eq!(core.dma().rx_ring.hardware_owned(), 4);
    }

    #[test]
    fn test_worker_thread_delivers_frames() {
        let core = started_core(CoreConfig::default());
        let sink = Arc::new(CollectSink::default());
        let worker = WorkerThread::spawn(&core, Arc::clone(&sink));

        for len in [60, 70, 80] {
            assert!(core.hardware().deliver_rx(core.dma(), &vec![len as u8; len], None));
        }
        core.hardware().raise(false, true, 0, 0);
        core.handle_interrupt();

        let frames = sink.wait_for(3);
        let lens: Vec<usize> = frames.iter().map(|f| f.len()).collect();
        assert_eq!(lens, vec![60, 70, 80]);

        drop(worker);
        assert_eq!(core.stats().snapshot().rx_frames, 3);
    }
}
