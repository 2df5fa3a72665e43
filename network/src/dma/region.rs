//! DMA area of one MAC.
//!
//! # Layout
//! ```text
//! tx_ring  ──► tx_pool   one descriptor per transmit segment
//! rx_ring  ──► rx_pool   one descriptor per receive buffer
//! ```
//!
//! This is the memory the hardware side operates on. A MAC HAL mirrors the
//! rings into the device's descriptor lists; the test simulator reads and
//! writes them directly.

use super::pool::BufferPool;
use super::ring::DescriptorRing;
use crate::config::CoreConfig;
use crate::platform::Platform;
use crate::sync::Semaphore;

pub struct DmaArea<S: Semaphore> {
    pub tx_pool: BufferPool<S>,
    pub rx_pool: BufferPool<S>,
    pub tx_ring: DescriptorRing,
    pub rx_ring: DescriptorRing,
}

impl<S: Semaphore> DmaArea<S> {
    /// Carve pools and rings from an already validated config.
    pub fn new<P: Platform<Semaphore = S>>(config: &CoreConfig, platform: &P) -> Self {
        let tx = config.tx_buffer_count as u32;
        let rx = config.rx_buffer_count as u32;
        Self {
            tx_pool: BufferPool::new(
                config.tx_buffer_count,
                config.tx_buffer_size,
                platform.semaphore(tx, tx),
            ),
            rx_pool: BufferPool::new(
                config.rx_buffer_count,
                config.rx_buffer_size,
                platform.semaphore(rx, rx),
            ),
            tx_ring: DescriptorRing::new(config.tx_descriptor_count),
            rx_ring: DescriptorRing::new(config.rx_descriptor_count),
        }
    }
}
