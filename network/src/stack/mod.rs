//! smoltcp integration layer.
//!
//! The worker delivers received frames into a [`FrameQueue`];
//! [`DeviceAdapter`] hands them to smoltcp and routes smoltcp's transmit
//! tokens into [`NetworkDeviceCore::transmit`].
//!
//! # Usage
//!
//! ```ignore
//! let queue = FrameQueue::new(16);
//! // worker task
//! core.run_worker(&HeapAllocator::new(MAX_FRAME_SIZE), &queue);
//! // stack task
//! let mut device = DeviceAdapter::new(&core, &queue);
//! iface.poll(now, &mut device, &mut sockets);
//! ```

use alloc::collections::VecDeque;
use alloc::vec;

use log::warn;
use smoltcp::phy::{self, Device, DeviceCapabilities, Medium};
use smoltcp::time::Instant;
use spin::Mutex;

use crate::driver::{MacHardware, NetworkDeviceCore};
use crate::packet::{Frame, FrameSink, PacketError};
use crate::platform::Platform;
use crate::types::ETH_HLEN;

/// Largest IP packet plus Ethernet header.
pub const MTU: usize = 1500 + ETH_HLEN;

/// Bounded hand-off of received frames from the worker to the stack.
pub struct FrameQueue {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn pop(&self) -> Option<Frame> {
        self.frames.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink<Frame> for FrameQueue {
    /// Refuses the frame when the stack has fallen `capacity` frames behind.
    fn deliver(&self, packet: Frame) -> Result<(), PacketError> {
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            return Err(PacketError::Rejected);
        }
        frames.push_back(packet);
        Ok(())
    }
}

/// Exposes a [`NetworkDeviceCore`] to smoltcp.
pub struct DeviceAdapter<'a, P: Platform, H: MacHardware> {
    core: &'a NetworkDeviceCore<P, H>,
    rx: &'a FrameQueue,
}

impl<'a, P: Platform, H: MacHardware> DeviceAdapter<'a, P, H> {
    pub fn new(core: &'a NetworkDeviceCore<P, H>, rx: &'a FrameQueue) -> Self {
        Self { core, rx }
    }
}

impl<'a, P: Platform, H: MacHardware> Device for DeviceAdapter<'a, P, H> {
    type RxToken<'b> = RxToken where Self: 'b;
    type TxToken<'b> = TxToken<'b, P, H> where Self: 'b;

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.max_transmission_unit = MTU;
        caps.max_burst_size = Some(1);
        caps.medium = Medium::Ethernet;
        caps
    }

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        let frame = self.rx.pop()?;
        Some((RxToken { frame }, TxToken { core: self.core }))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        self.core.is_running().then_some(TxToken { core: self.core })
    }
}

pub struct RxToken {
    frame: Frame,
}

impl phy::RxToken for RxToken {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(self.frame.data_mut())
    }
}

pub struct TxToken<'a, P: Platform, H: MacHardware> {
    core: &'a NetworkDeviceCore<P, H>,
}

impl<P: Platform, H: MacHardware> phy::TxToken for TxToken<'_, P, H> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut buffer = vec![0u8; len];
        let result = f(&mut buffer);
        // smoltcp has no way to hear about the failure; it is counted in
        // the device statistics.
        if let Err(e) = self.core.transmit(&buffer[..]) {
            warn!("eth: stack frame of {} bytes not sent: {}", len, e);
        }
        result
    }
}
