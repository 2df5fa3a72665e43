//! PTP register access.

use core::ptr::NonNull;

/// Raw access to the MAC's PTP timestamp unit.
pub trait PtpRegisters: Send + Sync {
    fn read_control(&self) -> u32;
    fn write_control(&self, value: u32);
    fn write_subsecond_increment(&self, increment: u8);
    fn write_addend(&self, addend: u32);
    /// Stage a time value for the next INIT or UPDATE command.
    fn write_time_update(&self, seconds: u32, nanoseconds: u32);
    fn read_seconds(&self) -> u32;
    fn read_nanoseconds(&self) -> u32;
}

/// Timestamp control register bits.
pub mod control {
    /// Timestamping enable.
    pub const ENABLE: u32 = 1 << 0;
    /// Fine (addend-based) correction instead of coarse.
    pub const FINE_UPDATE: u32 = 1 << 1;
    /// Load the staged time. Self-clearing.
    pub const INIT: u32 = 1 << 2;
    /// Add/subtract the staged time. Self-clearing.
    pub const UPDATE: u32 = 1 << 3;
    pub const INTERRUPT_TRIGGER: u32 = 1 << 4;
    /// Latch the addend register. Self-clearing.
    pub const ADDEND_UPDATE: u32 = 1 << 5;
    /// Timestamp every received frame.
    pub const SNAPSHOT_ALL: u32 = 1 << 8;
    /// Subsecond counter rolls over at 10^9 (nanoseconds) instead of 2^31.
    pub const DIGITAL_ROLLOVER: u32 = 1 << 9;
}

/// Nanosecond-update bit selecting subtraction.
pub const TIME_UPDATE_SUBTRACT: u32 = 1 << 31;

/// MAC without a timestamp unit.
#[derive(Debug, Clone, Copy)]
pub enum NoPtp {}

impl PtpRegisters for NoPtp {
    fn read_control(&self) -> u32 {
        match *self {}
    }
    fn write_control(&self, _value: u32) {
        match *self {}
    }
    fn write_subsecond_increment(&self, _increment: u8) {
        match *self {}
    }
    fn write_addend(&self, _addend: u32) {
        match *self {}
    }
    fn write_time_update(&self, _seconds: u32, _nanoseconds: u32) {
        match *self {}
    }
    fn read_seconds(&self) -> u32 {
        match *self {}
    }
    fn read_nanoseconds(&self) -> u32 {
        match *self {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MMIO
// ═══════════════════════════════════════════════════════════════════════════

// Word offsets from the start of the PTP block (ETH base + 0x700).
const TSCR: usize = 0x00 / 4;
const SSIR: usize = 0x04 / 4;
const TSHR: usize = 0x08 / 4;
const TSLR: usize = 0x0C / 4;
const TSHUR: usize = 0x10 / 4;
const TSLUR: usize = 0x14 / 4;
const TSAR: usize = 0x18 / 4;

/// Offset of the PTP block within the Ethernet peripheral.
pub const PTP_BLOCK_OFFSET: usize = 0x700;

/// Memory-mapped PTP block of an STM32-family MAC.
#[derive(Debug, Clone, Copy)]
pub struct MmioPtpRegisters {
    base: NonNull<u32>,
}

// SAFETY: register accesses are single volatile word operations; sequencing
// is the caller's job (critical sections in PtpClock).
unsafe impl Send for MmioPtpRegisters {}
unsafe impl Sync for MmioPtpRegisters {}

impl MmioPtpRegisters {
    /// # Safety
    /// `base` must point to the mapped PTP block (ETH base + 0x700) and stay
    /// mapped for the lifetime of every copy of this handle.
    pub const unsafe fn new(base: NonNull<u32>) -> Self {
        Self { base }
    }

    fn read(&self, word: usize) -> u32 {
        // SAFETY: in-bounds register of the block promised by `new`.
        unsafe { core::ptr::read_volatile(self.base.as_ptr().add(word)) }
    }

    fn write(&self, word: usize, value: u32) {
        // SAFETY: as in `read`.
        unsafe { core::ptr::write_volatile(self.base.as_ptr().add(word), value) }
    }
}

impl PtpRegisters for MmioPtpRegisters {
    fn read_control(&self) -> u32 {
        self.read(TSCR)
    }

    fn write_control(&self, value: u32) {
        self.write(TSCR, value)
    }

    fn write_subsecond_increment(&self, increment: u8) {
        self.write(SSIR, increment as u32)
    }

    fn write_addend(&self, addend: u32) {
        self.write(TSAR, addend)
    }

    fn write_time_update(&self, seconds: u32, nanoseconds: u32) {
        self.write(TSHUR, seconds);
        self.write(TSLUR, nanoseconds);
    }

    fn read_seconds(&self) -> u32 {
        self.read(TSHR)
    }

    fn read_nanoseconds(&self) -> u32 {
        self.read(TSLR)
    }
}
