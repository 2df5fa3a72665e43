//! Driver trait definitions.
//!
//! [`MacHardware`] is the seam between the data-plane core and a concrete MAC
//! (register-level HAL, vendor HAL binding, or the test simulator). The core
//! prepares descriptors in the [`DmaArea`](crate::dma::DmaArea) and uses this
//! trait only to ring doorbells, start/stop engines and read status.

use thiserror::Error;

use crate::clock::PtpRegisters;
use crate::types::LinkState;

/// TX error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TxError {
    /// Frame larger than the whole transmit pool. Nothing was allocated.
    #[error("frame of {len} bytes exceeds the {max} byte transmit limit")]
    TooLarge { len: usize, max: usize },
    /// The packet object could not supply its payload.
    #[error("could not read packet payload")]
    PacketRead,
    /// The transmit DMA refused the descriptor chain.
    #[error("transmit DMA rejected the frame: {0}")]
    Submit(HalError),
    /// No completion within the configured bound.
    #[error("no transmit completion within {0} ms")]
    Timeout(u64),
}

/// Hardware abstraction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HalError {
    #[error("engine busy")]
    Busy,
    #[error("engine not started")]
    NotStarted,
    #[error("descriptor ring full")]
    RingFull,
    #[error("hardware error state {0:#x}")]
    Fault(u32),
}

// ═══════════════════════════════════════════════════════════════════════════
// STATUS BITS
// ═══════════════════════════════════════════════════════════════════════════

/// DMA status error flags.
pub mod dma_errors {
    pub const TX_PROCESS_STOPPED: u32 = 1 << 1;
    pub const TX_JABBER_TIMEOUT: u32 = 1 << 3;
    pub const RX_BUFFER_UNAVAILABLE: u32 = 1 << 7;
    pub const RX_PROCESS_STOPPED: u32 = 1 << 8;
    pub const RX_WATCHDOG_TIMEOUT: u32 = 1 << 9;
    pub const EARLY_TRANSMIT: u32 = 1 << 10;
    pub const FATAL_BUS_ERROR: u32 = 1 << 13;
}

/// MAC transmit/receive error flags.
pub mod mac_errors {
    pub const RX_WATCHDOG_TIMEOUT: u32 = 1 << 0;
    pub const EXCESSIVE_COLLISIONS: u32 = 1 << 1;
    pub const LATE_COLLISION: u32 = 1 << 2;
    pub const EXCESSIVE_DEFERRAL: u32 = 1 << 3;
    pub const JABBER_TIMEOUT: u32 = 1 << 4;
    pub const LOSS_OF_CARRIER: u32 = 1 << 5;
    pub const NO_CARRIER: u32 = 1 << 6;
}

/// Interrupt causes, read and cleared by [`MacHardware::acknowledge_interrupts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrqStatus {
    pub tx_complete: bool,
    pub rx_complete: bool,
    /// [`dma_errors`] bits.
    pub dma_errors: u32,
    /// [`mac_errors`] bits.
    pub mac_errors: u32,
}

impl IrqStatus {
    pub fn has_errors(&self) -> bool {
        self.dma_errors != 0 || self.mac_errors != 0
    }
}

/// Cumulative error indicators, read for diagnostics after a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HwErrorState {
    /// Vendor error-state code if the engine is in its error state.
    pub state_error: Option<u32>,
    pub dma_errors: u32,
    pub mac_errors: u32,
}

// ═══════════════════════════════════════════════════════════════════════════
// TRAITS
// ═══════════════════════════════════════════════════════════════════════════

/// A DMA-capable Ethernet MAC.
///
/// Every method takes `&self`: the core calls `acknowledge_interrupts` from
/// the interrupt handler while a task may be inside `transmit_demand`.
pub trait MacHardware: Send + Sync {
    /// PTP register block. Use [`NoPtp`](crate::clock::NoPtp) if there is none.
    type Ptp: PtpRegisters;

    /// Start both DMA engines and the MAC.
    fn start(&self) -> Result<(), HalError>;

    fn stop(&self) -> Result<(), HalError>;

    /// Apply negotiated speed and duplex. Called with the MAC stopped.
    fn configure_link(&self, link: LinkState) -> Result<(), HalError>;

    /// Transmit poll demand: new descriptors are owned by hardware.
    fn transmit_demand(&self) -> Result<(), HalError>;

    /// Receive poll demand: descriptors were refilled.
    fn receive_demand(&self);

    /// Read and clear pending interrupt causes. Runs in interrupt context.
    fn acknowledge_interrupts(&self) -> IrqStatus;

    fn error_state(&self) -> HwErrorState;

    /// Handle to the PTP registers, `None` if the MAC has no PTP unit.
    fn ptp_registers(&self) -> Option<Self::Ptp>;
}
