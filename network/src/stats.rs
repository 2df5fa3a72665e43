//! Device statistics.
//!
//! Counters only. Nothing in the data path reads them back to make a
//! decision.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::driver::traits::{dma_errors, mac_errors};

#[derive(Debug, Default)]
pub struct DeviceStats {
    rx_frames: AtomicU32,
    tx_frames: AtomicU32,
    rx_errors: AtomicU32,
    tx_errors: AtomicU32,
    rx_dropped: AtomicU32,
    late_completions: AtomicU32,
}

/// Point-in-time copy of [`DeviceStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub rx_frames: u32,
    pub tx_frames: u32,
    pub rx_errors: u32,
    pub tx_errors: u32,
    pub rx_dropped: u32,
    pub late_completions: u32,
}

fn bump(counter: &AtomicU32) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl DeviceStats {
    pub const fn new() -> Self {
        Self {
            rx_frames: AtomicU32::new(0),
            tx_frames: AtomicU32::new(0),
            rx_errors: AtomicU32::new(0),
            tx_errors: AtomicU32::new(0),
            rx_dropped: AtomicU32::new(0),
            late_completions: AtomicU32::new(0),
        }
    }

    pub fn rx_frame(&self) {
        bump(&self.rx_frames);
    }

    pub fn tx_frame(&self) {
        bump(&self.tx_frames);
    }

    pub fn rx_error(&self) {
        bump(&self.rx_errors);
    }

    pub fn tx_error(&self) {
        bump(&self.tx_errors);
    }

    /// A received frame was discarded (allocation or copy failure).
    pub fn rx_drop(&self) {
        bump(&self.rx_dropped);
        bump(&self.rx_errors);
    }

    pub fn late_completion(&self) {
        bump(&self.late_completions);
    }

    /// Count the error flags of one fault event.
    ///
    /// Each DMA and MAC flag is attributed to the receive or transmit side.
    /// Several flags in one event count once per side.
    pub fn record_fault(&self, dma: u32, mac: u32) {
        const DMA_RX: u32 = dma_errors::RX_WATCHDOG_TIMEOUT
            | dma_errors::RX_PROCESS_STOPPED
            | dma_errors::RX_BUFFER_UNAVAILABLE;
        const DMA_TX: u32 = dma_errors::EARLY_TRANSMIT
            | dma_errors::TX_PROCESS_STOPPED
            | dma_errors::TX_JABBER_TIMEOUT;
        const MAC_TX: u32 = mac_errors::EXCESSIVE_COLLISIONS
            | mac_errors::LATE_COLLISION
            | mac_errors::EXCESSIVE_DEFERRAL
            | mac_errors::JABBER_TIMEOUT
            | mac_errors::LOSS_OF_CARRIER
            | mac_errors::NO_CARRIER;

        if dma & DMA_RX != 0 || mac & mac_errors::RX_WATCHDOG_TIMEOUT != 0 {
            self.rx_error();
        }
        if dma & DMA_TX != 0 || mac & MAC_TX != 0 {
            self.tx_error();
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_frames: self.rx_frames.load(Ordering::Relaxed),
            tx_frames: self.tx_frames.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            late_completions: self.late_completions.load(Ordering::Relaxed),
        }
    }
}
