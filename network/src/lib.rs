//! Ethernet MAC data-plane core.
//!
//! Moves frame bytes between a host network stack and a DMA-capable MAC, and
//! keeps the MAC's PTP hardware clock disciplined.
//!
//! # Layout
//! ```text
//! dma/      BufferPool, DescriptorRing, ownership tags (leaf layer)
//! driver/   NetworkDeviceCore: transmit/receive pipelines, event channel, worker
//! clock/    PTP register access and the clock model
//! sync/     Semaphore abstraction and the exclusive transmit section
//! time/     Timeouts and deadlines
//! stack/    smoltcp phy::Device adapter
//! ```
//!
//! Everything hangs off one owned [`NetworkDeviceCore`] built at startup and
//! shared by reference between the interrupt handler, the worker task and
//! transmitting tasks. There is no global mutable state.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod clock;
pub mod config;
pub mod dma;
pub mod driver;
pub mod error;
pub mod packet;
pub mod platform;
pub mod stats;
pub mod sync;
pub mod time;
pub mod types;

#[cfg(feature = "stack")]
pub mod stack;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{CoreConfig, PtpConfig};
pub use driver::{NetworkDeviceCore, TxReport};
pub use error::{ConfigError, NetworkError, Result};
pub use platform::Platform;
pub use types::{LinkState, PtpTime};

#[cfg(feature = "stack")]
pub use stack::{DeviceAdapter, FrameQueue};
