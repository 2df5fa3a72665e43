//! PTP clock model: set, get, one-shot adjust and rate adjust.

use log::debug;
use spin::Mutex;

use super::regs::{control, PtpRegisters, TIME_UPDATE_SUBTRACT};
use super::ClockError;
use crate::config::PtpConfig;
use crate::platform::Platform;
use crate::types::{PtpTime, NSEC_PER_SEC};

/// Frequency-ratio state behind the committed addend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockState {
    /// `source_hz / reference_hz`, fixed at init.
    pub nominal_ratio: f64,
    /// Product of every accepted `rate_adjust` ratio. Starts at 1.0.
    pub cumulative_adjustment: f64,
    /// Value last latched into the addend register.
    pub addend: u32,
    pub subsecond_increment: u8,
}

/// Addend for a nominal ratio and correction: `u32::MAX × nominal × adjustment`.
///
/// `None` if the product does not fit the register.
fn addend_for(nominal_ratio: f64, adjustment: f64) -> Option<u32> {
    let addend = u32::MAX as f64 * nominal_ratio * adjustment;
    (addend <= u32::MAX as f64).then_some(addend as u32)
}

/// The MAC's PTP hardware clock.
pub struct PtpClock<R: PtpRegisters, P: Platform> {
    regs: R,
    platform: P,
    config: PtpConfig,
    state: Mutex<ClockState>,
}

impl<R: PtpRegisters, P: Platform> PtpClock<R, P> {
    /// Program the timestamp unit and start the clock at zero.
    ///
    /// Fails if the source rate does not give an integral nanosecond
    /// period that fits the 8-bit increment register, or if the reference
    /// clock is slower than the source.
    pub fn init(regs: R, platform: P, config: PtpConfig) -> Result<Self, ClockError> {
        let source = config.source_clock_hz;
        if source == 0 || NSEC_PER_SEC % source != 0 {
            return Err(ClockError::InvalidSourceRate(source));
        }
        let increment = NSEC_PER_SEC / source;
        let increment = u8::try_from(increment).map_err(|_| ClockError::IncrementTooLarge(increment))?;
        if config.reference_clock_hz < source {
            return Err(ClockError::InvalidReferenceRate {
                reference: config.reference_clock_hz,
                source_hz: source,
            });
        }

        let nominal_ratio = source as f64 / config.reference_clock_hz as f64;
        let addend = addend_for(nominal_ratio, 1.0).ok_or(ClockError::InvalidReferenceRate {
            reference: config.reference_clock_hz,
            source_hz: source,
        })?;

        let clock = Self {
            regs,
            platform,
            config,
            state: Mutex::new(ClockState {
                nominal_ratio,
                cumulative_adjustment: 1.0,
                addend,
                subsecond_increment: increment,
            }),
        };

        clock.platform.critical_section(|| {
            let regs = &clock.regs;
            regs.write_control(regs.read_control() | control::ENABLE | control::SNAPSHOT_ALL);
            regs.write_subsecond_increment(increment);
            regs.write_addend(addend);
            clock.commit(control::ADDEND_UPDATE)?;
            regs.write_control(regs.read_control() | control::FINE_UPDATE | control::DIGITAL_ROLLOVER);
            regs.write_time_update(0, 0);
            clock.commit(control::INIT)
        })?;

        debug!(
            "ptp: clock running, increment {} ns, addend {:#010x}",
            increment, addend
        );
        Ok(clock)
    }

    /// Load an absolute time.
    pub fn set(&self, time: PtpTime) -> Result<(), ClockError> {
        let seconds = u32::try_from(time.second).map_err(|_| ClockError::SecondsOverflow(time.second))?;
        if time.nanosecond >= NSEC_PER_SEC {
            return Err(ClockError::InvalidNanoseconds(time.nanosecond));
        }
        self.platform.critical_section(|| {
            self.regs.write_time_update(seconds, time.nanosecond);
            self.commit(control::INIT)
        })
    }

    /// Read the current time, correcting for a seconds rollover between
    /// the two register reads.
    pub fn get(&self) -> PtpTime {
        let (first, nanosecond, second) = self.platform.critical_section(|| {
            let first = self.regs.read_seconds();
            let nanosecond = self.regs.read_nanoseconds();
            let second = self.regs.read_seconds();
            (first, nanosecond, second)
        });

        // A low nanosecond value was sampled after the rollover, so it
        // belongs with the later seconds read.
        let seconds = if first != second && nanosecond < NSEC_PER_SEC / 2 {
            second
        } else {
            first
        };
        PtpTime::new(seconds as u64, nanosecond)
    }

    /// Step the clock by `offset_ns`, which must be strictly within ±1 s.
    pub fn adjust(&self, offset_ns: i64) -> Result<(), ClockError> {
        if offset_ns.unsigned_abs() >= NSEC_PER_SEC as u64 {
            return Err(ClockError::OffsetOutOfRange(offset_ns));
        }
        let magnitude = offset_ns.unsigned_abs() as u32;
        let nanoseconds = if offset_ns >= 0 {
            magnitude
        } else {
            TIME_UPDATE_SUBTRACT | (NSEC_PER_SEC - magnitude)
        };

        self.platform.critical_section(|| {
            self.regs.write_time_update(0, nanoseconds);
            self.commit(control::UPDATE)
        })
    }

    /// Scale the clock rate by `ratio` relative to its current correction.
    ///
    /// The combined correction must stay within the configured percentage
    /// band; otherwise nothing changes.
    pub fn rate_adjust(&self, ratio: f64) -> Result<(), ClockError> {
        if ratio == 1.0 {
            return Ok(());
        }
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ClockError::RatioOutOfRange);
        }

        let mut state = self.state.lock();
        let combined = ratio * state.cumulative_adjustment;
        let pct = combined * 100.0;
        if pct < self.config.adjust_min_pct as f64 || pct > self.config.adjust_max_pct as f64 {
            debug!("ptp: rejecting rate adjustment to {}%", pct);
            return Err(ClockError::RatioOutOfRange);
        }

        // A reference clock close to the source leaves no headroom above
        // the nominal addend.
        let Some(addend) = addend_for(state.nominal_ratio, combined) else {
            debug!("ptp: addend overflows at {}%", pct);
            return Err(ClockError::RatioOutOfRange);
        };
        self.platform.critical_section(|| {
            self.regs.write_addend(addend);
            self.commit(control::ADDEND_UPDATE)
        })?;

        state.cumulative_adjustment = combined;
        state.addend = addend;
        Ok(())
    }

    pub fn state(&self) -> ClockState {
        *self.state.lock()
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    // Set a self-clearing command bit and wait for hardware to clear it.
    fn commit(&self, bit: u32) -> Result<(), ClockError> {
        self.regs.write_control(self.regs.read_control() | bit);
        for _ in 0..self.config.commit_spin_limit {
            if self.regs.read_control() & bit == 0 {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(ClockError::CommitTimeout(bit))
    }
}
