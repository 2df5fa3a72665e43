//! PTP hardware clock.
//!
//! A free-running seconds:nanoseconds counter advanced on every reference
//! tick by an accumulator whose `addend` sets the effective rate. The model
//! keeps the nominal ratio (fixed at init) apart from the cumulative external
//! correction so repeated rate adjustments compose multiplicatively.
//!
//! Multi-register sequences run inside
//! [`Platform::critical_section`](crate::Platform::critical_section); a torn
//! write here is a wrong time, not a benign race.

pub mod ptp;
pub mod regs;

pub use ptp::{ClockState, PtpClock};
pub use regs::{control, MmioPtpRegisters, NoPtp, PtpRegisters, TIME_UPDATE_SUBTRACT};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClockError {
    /// One-shot offsets must be strictly within one second.
    #[error("offset of {0} ns is not within one second")]
    OffsetOutOfRange(i64),
    /// Combined rate correction falls outside the configured band.
    #[error("rate adjustment outside the configured band")]
    RatioOutOfRange,
    /// A self-clearing control bit did not clear.
    #[error("control bit {0:#x} did not clear")]
    CommitTimeout(u32),
    #[error("{0} seconds does not fit the 32-bit seconds register")]
    SecondsOverflow(u64),
    #[error("nanosecond field {0} is not below one second")]
    InvalidNanoseconds(u32),
    /// The source rate must divide one second into whole nanoseconds.
    #[error("source clock of {0} Hz has no integral nanosecond period")]
    InvalidSourceRate(u32),
    /// The subsecond increment register is 8 bits wide.
    #[error("subsecond increment of {0} ns exceeds 255")]
    IncrementTooLarge(u32),
    #[error("reference clock of {reference} Hz cannot drive a {source_hz} Hz source")]
    InvalidReferenceRate { reference: u32, source_hz: u32 },
    #[error("MAC has no PTP unit")]
    Unsupported,
}
