//! Network error types

use thiserror::Error;

use crate::clock::ClockError;
use crate::driver::traits::{HalError, TxError};

pub type Result<T> = core::result::Result<T, NetworkError>;

/// Rejected [`CoreConfig`](crate::CoreConfig) values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{what} must be between 1 and {max}, got {value}")]
    CountOutOfRange {
        what: &'static str,
        value: usize,
        max: usize,
    },
    #[error("{what} of {value} bytes is below the {min} byte minimum")]
    BufferTooSmall {
        what: &'static str,
        value: usize,
        min: usize,
    },
    #[error("receive buffer size {0} is not a multiple of 4")]
    RxBufferMisaligned(usize),
    #[error("{descriptors} transmit descriptors cannot map {buffers} transmit buffers")]
    TxRingTooShort { descriptors: usize, buffers: usize },
    #[error("{count} transmit buffers of {size} bytes overflow the frame length")]
    TxPoolTooLarge { count: usize, size: usize },
    #[error("clock adjustment band {min}%..{max}% does not contain 100%")]
    AdjustBand { min: u32, max: u32 },
}

/// Crate-level error, for callers that do not care which layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("transmit failed: {0}")]
    Transmit(#[from] TxError),
    #[error("hardware: {0}")]
    Hardware(#[from] HalError),
    #[error("ptp clock: {0}")]
    Clock(#[from] ClockError),
}
