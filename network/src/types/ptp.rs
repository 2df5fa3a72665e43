//! PTP timestamps.

pub const NSEC_PER_SEC: u32 = 1_000_000_000;

/// Seconds and nanoseconds on the PTP timescale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct PtpTime {
    pub second: u64,
    pub nanosecond: u32,
}

impl PtpTime {
    pub const fn new(second: u64, nanosecond: u32) -> Self {
        Self { second, nanosecond }
    }
}
