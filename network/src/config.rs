//! Driver core configuration.
//!
//! Supplied once at construction and immutable for the lifetime of the
//! [`NetworkDeviceCore`](crate::NetworkDeviceCore).

use core::time::Duration;

use crate::error::ConfigError;

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════

/// Largest frame the MAC moves, including the 4-byte FCS.
pub const MAX_FRAME_SIZE: usize = 1524;

/// Descriptors per ring.
pub const DEFAULT_DESCRIPTOR_COUNT: usize = 4;

/// Transmit completion wait.
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_millis(20);

/// PTP clock source feeding the subsecond counter.
pub const DEFAULT_PTP_SOURCE_HZ: u32 = 50_000_000;

pub const DEFAULT_ADJUST_MIN_PCT: u32 = 90;
pub const DEFAULT_ADJUST_MAX_PCT: u32 = 110;

/// Polls of a self-clearing PTP control bit before giving up.
pub const DEFAULT_COMMIT_SPIN_LIMIT: u32 = 100_000;

/// Smallest buffer worth configuring (one minimum Ethernet frame).
pub const MIN_BUFFER_SIZE: usize = 64;

/// Slot indices are `u16` and `u16::MAX` marks end-of-chain.
pub const MAX_SLOTS: usize = u16::MAX as usize - 1;

// ═══════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// Buffer, ring and timing parameters of one MAC instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Transmit pool capacity. A frame may use every buffer.
    pub tx_buffer_count: usize,
    pub tx_buffer_size: usize,
    pub rx_buffer_count: usize,
    /// Must be a multiple of 4 (DMA word alignment).
    pub rx_buffer_size: usize,
    pub tx_descriptor_count: usize,
    pub rx_descriptor_count: usize,
    /// In-flight transmit contexts.
    pub tx_context_count: usize,
    /// Bound on the transmit completion wait.
    pub tx_timeout: Duration,
    /// `None` disables hardware timestamping and the PTP clock.
    pub ptp: Option<PtpConfig>,
}

/// PTP clock parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PtpConfig {
    /// Measured rate of the clock driving the addend accumulator (HCLK).
    pub reference_clock_hz: u32,
    /// Desired rate of the subsecond counter.
    pub source_clock_hz: u32,
    /// Lower edge of the accepted cumulative rate adjustment, in percent.
    pub adjust_min_pct: u32,
    /// Upper edge of the accepted cumulative rate adjustment, in percent.
    pub adjust_max_pct: u32,
    pub commit_spin_limit: u32,
}

impl PtpConfig {
    pub fn new(reference_clock_hz: u32) -> Self {
        Self {
            reference_clock_hz,
            source_clock_hz: DEFAULT_PTP_SOURCE_HZ,
            adjust_min_pct: DEFAULT_ADJUST_MIN_PCT,
            adjust_max_pct: DEFAULT_ADJUST_MAX_PCT,
            commit_spin_limit: DEFAULT_COMMIT_SPIN_LIMIT,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            tx_buffer_count: DEFAULT_DESCRIPTOR_COUNT,
            tx_buffer_size: MAX_FRAME_SIZE,
            rx_buffer_count: DEFAULT_DESCRIPTOR_COUNT,
            rx_buffer_size: MAX_FRAME_SIZE,
            tx_descriptor_count: DEFAULT_DESCRIPTOR_COUNT,
            rx_descriptor_count: DEFAULT_DESCRIPTOR_COUNT,
            tx_context_count: DEFAULT_DESCRIPTOR_COUNT,
            tx_timeout: DEFAULT_TX_TIMEOUT,
            ptp: None,
        }
    }
}

impl CoreConfig {
    /// Largest frame `transmit` accepts.
    pub fn max_tx_frame(&self) -> usize {
        self.tx_buffer_count.saturating_mul(self.tx_buffer_size)
    }

    pub fn timestamping(&self) -> bool {
        self.ptp.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("tx_buffer_count", self.tx_buffer_count),
            ("rx_buffer_count", self.rx_buffer_count),
            ("tx_descriptor_count", self.tx_descriptor_count),
            ("rx_descriptor_count", self.rx_descriptor_count),
            ("tx_context_count", self.tx_context_count),
        ];
        for (what, value) in counts {
            if value == 0 || value > MAX_SLOTS {
                return Err(ConfigError::CountOutOfRange { what, value, max: MAX_SLOTS });
            }
        }

        for (what, value) in [
            ("tx_buffer_size", self.tx_buffer_size),
            ("rx_buffer_size", self.rx_buffer_size),
        ] {
            if value < MIN_BUFFER_SIZE {
                return Err(ConfigError::BufferTooSmall { what, value, min: MIN_BUFFER_SIZE });
            }
        }

        if self.rx_buffer_size % 4 != 0 {
            return Err(ConfigError::RxBufferMisaligned(self.rx_buffer_size));
        }

        if self.tx_buffer_count.checked_mul(self.tx_buffer_size).is_none() {
            return Err(ConfigError::TxPoolTooLarge {
                count: self.tx_buffer_count,
                size: self.tx_buffer_size,
            });
        }

        // One descriptor per segment, and a full-size frame may take every buffer.
        if self.tx_descriptor_count < self.tx_buffer_count {
            return Err(ConfigError::TxRingTooShort {
                descriptors: self.tx_descriptor_count,
                buffers: self.tx_buffer_count,
            });
        }

        if let Some(ptp) = &self.ptp {
            if ptp.adjust_min_pct >= 100 || ptp.adjust_max_pct <= 100 {
                return Err(ConfigError::AdjustBand {
                    min: ptp.adjust_min_pct,
                    max: ptp.adjust_max_pct,
                });
            }
        }

        Ok(())
    }
}
