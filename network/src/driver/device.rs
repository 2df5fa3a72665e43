//! The driver core aggregate.

use core::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};

use super::context::TxContextPool;
use super::irq::{Event, EventChannel};
use super::traits::{HalError, MacHardware};
use crate::clock::{ClockError, PtpClock};
use crate::config::CoreConfig;
use crate::dma::DmaArea;
use crate::error::NetworkError;
use crate::platform::Platform;
use crate::stats::DeviceStats;
use crate::sync::Section;
use crate::types::LinkState;

/// Everything one MAC instance owns: DMA area, transmit contexts, the event
/// channel, the PTP clock and statistics.
///
/// Built once at startup and shared by reference. Every operation takes
/// `&self`:
/// - the interrupt handler calls [`handle_interrupt`](Self::handle_interrupt)
/// - one worker task runs [`run_worker`](Self::run_worker)
/// - any number of tasks call [`transmit`](Self::transmit), serialized
///   internally by the exclusive transmit section
pub struct NetworkDeviceCore<P: Platform, H: MacHardware> {
    pub(super) config: CoreConfig,
    pub(super) platform: P,
    pub(super) hw: H,
    pub(super) dma: DmaArea<P::Semaphore>,
    pub(super) contexts: TxContextPool<P::Semaphore>,
    pub(super) tx_section: Section<P::Semaphore>,
    pub(super) tx_done: P::Semaphore,
    pub(super) events: EventChannel<P::Semaphore>,
    pub(super) clock: Option<PtpClock<H::Ptp, P>>,
    pub(super) stats: DeviceStats,
    carrier: AtomicBool,
    running: AtomicBool,
}

impl<P: Platform, H: MacHardware> NetworkDeviceCore<P, H> {
    /// Validate `config`, build pools and rings, and bring up the PTP clock
    /// if timestamping is configured. The MAC is left stopped.
    pub fn new(config: CoreConfig, platform: P, hw: H) -> Result<Self, NetworkError> {
        config.validate()?;

        let clock = match config.ptp {
            Some(ptp) => {
                let regs = hw.ptp_registers().ok_or(ClockError::Unsupported)?;
                Some(PtpClock::init(regs, platform.clone(), ptp)?)
            }
            None => None,
        };

        let contexts = config.tx_context_count as u32;
        Ok(Self {
            dma: DmaArea::new(&config, &platform),
            contexts: TxContextPool::new(config.tx_context_count, platform.semaphore(contexts, contexts)),
            tx_section: Section::new(platform.semaphore(1, 1)),
            tx_done: platform.semaphore(0, 1),
            events: EventChannel::new(platform.semaphore(0, 1)),
            clock,
            stats: DeviceStats::new(),
            carrier: AtomicBool::new(false),
            running: AtomicBool::new(false),
            config,
            platform,
            hw,
        })
    }

    /// Arm the receive ring and start the engines.
    pub fn start(&self) -> Result<(), HalError> {
        self.refill_rx();
        self.hw.start()?;
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    pub fn stop(&self) -> Result<(), HalError> {
        self.running.store(false, Ordering::Release);
        self.hw.stop()
    }

    /// PHY callback: reconfigure and restart on link up, drop carrier on
    /// link down.
    pub fn link_changed(&self, link: LinkState) -> Result<(), HalError> {
        if let Err(e) = self.stop() {
            warn!("eth: failed to stop MAC for link change: {}", e);
        }

        if !link.up {
            self.carrier.store(false, Ordering::Release);
            debug!("eth: link down");
            return Ok(());
        }

        self.hw.configure_link(link)?;
        self.start()?;
        self.carrier.store(true, Ordering::Release);
        debug!(
            "eth: link up, {:?} {} duplex",
            link.speed,
            if link.full_duplex { "full" } else { "half" }
        );
        Ok(())
    }

    /// Interrupt entry point. Reads and acknowledges the MAC status and
    /// posts event tokens; does nothing else.
    pub fn handle_interrupt(&self) {
        let status = self.hw.acknowledge_interrupts();
        if status.has_errors() {
            self.events.post_fault(status.dma_errors, status.mac_errors);
        }
        if status.tx_complete {
            self.events.post(Event::TxComplete);
        }
        if status.rx_complete {
            self.events.post(Event::RxAvailable);
        }
    }

    pub fn carrier_ok(&self) -> bool {
        self.carrier.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Memory the hardware side operates on.
    pub fn dma(&self) -> &DmaArea<P::Semaphore> {
        &self.dma
    }

    pub fn clock(&self) -> Option<&PtpClock<H::Ptp, P>> {
        self.clock.as_ref()
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    pub fn tx_contexts(&self) -> &TxContextPool<P::Semaphore> {
        &self.contexts
    }

    pub fn timestamping(&self) -> bool {
        self.clock.is_some()
    }
}
