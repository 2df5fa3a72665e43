//! Transmit pipeline.
//!
//! `transmit` segments a frame across pool buffers, submits one descriptor
//! per segment and waits, bounded, for the completion signal. The whole
//! sequence runs inside the exclusive transmit section, so at most one frame
//! is being built or awaited at a time.
//!
//! # Completion
//! The worker turns the TxComplete token into a give on `tx_done`. After the
//! signal the completion handler (`collect_tx_completions`) retires
//! completed descriptors, returns their buffers, pulls the egress timestamp
//! and frees the context.
//!
//! # Timeout
//! The timeout path revokes its descriptors and frees the context and
//! buffers itself. Hardware that completes a revoked descriptor fails the
//! ownership transition; completions carrying a retired context token are
//! counted as late and ignored.

use core::cmp::min;

use log::{error, warn};

use super::context::TxToken;
use super::device::NetworkDeviceCore;
use super::traits::{HalError, MacHardware, TxError};
use crate::dma::{desc_flags, BufferIndex, DescOwnership};
use crate::packet::TxPacket;
use crate::platform::Platform;
use crate::sync::Semaphore;
use crate::time::timeout::duration_ms;
use crate::time::Timeout;
use crate::types::{ethertype, PtpTime, ETH_P_PTP};

/// Result of a completed transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxReport {
    /// Descriptors the frame occupied.
    pub segments: usize,
    /// Egress timestamp, if one was requested and captured.
    pub timestamp: Option<PtpTime>,
}

impl<P: Platform, H: MacHardware> NetworkDeviceCore<P, H> {
    /// Transmit one frame and wait for the hardware to finish it.
    ///
    /// # Returns
    /// - `Ok(report)`: completion signalled
    /// - `Err(TxError::TooLarge)`: frame exceeds the pool, nothing allocated
    /// - `Err(TxError::Timeout)`: no completion within `tx_timeout`
    ///
    /// # Contract
    /// - Blocks while contexts or buffers are exhausted
    /// - Blocks at most `tx_timeout` for the completion
    pub fn transmit<T: TxPacket + ?Sized>(&self, packet: &T) -> Result<TxReport, TxError> {
        let len = packet.len();
        let max = self.config.max_tx_frame();
        if len > max {
            error!("eth: frame of {} bytes too big, limit {}", len, max);
            return Err(TxError::TooLarge { len, max });
        }

        let _section = self.tx_section.enter();

        // Retire anything the previous frame left behind.
        self.collect_tx_completions(None);

        let token = self.allocate_tx_context();
        let head = match self.build_tx_chain(packet) {
            Ok(head) => head,
            Err(e) => {
                self.contexts.release(token);
                return Err(e);
            }
        };
        self.contexts.set_head(token, head);

        let timestamp = self.timestamping() && (packet.wants_timestamp() || self.is_ptp_frame(head));

        self.tx_done.reset();
        let segments = self.submit_tx_chain(token, head, timestamp)?;

        if let Err(e) = self.hw.transmit_demand() {
            error!("eth: transmit DMA refused frame: {}", e);
            self.reclaim_tx(token);
            self.stats.tx_error();
            return Err(TxError::Submit(e));
        }

        match self.await_tx_completion(token) {
            Some(timestamp) => {
                self.stats.tx_frame();
                Ok(TxReport { segments, timestamp })
            }
            None => {
                self.log_tx_timeout();
                self.reclaim_tx(token);
                self.stats.tx_error();
                Err(TxError::Timeout(duration_ms(self.config.tx_timeout)))
            }
        }
    }

    /// Wait until `token` is retired or `tx_timeout` runs out.
    ///
    /// A signal can belong to an earlier frame that timed out, so the frame
    /// is done only once collection has released its context.
    fn await_tx_completion(&self, token: TxToken) -> Option<Option<PtpTime>> {
        let deadline = Timeout::After(self.config.tx_timeout).deadline(self.platform.now_ms())?;
        loop {
            let remaining = deadline.remaining(self.platform.now_ms());
            if !self.tx_done.take(Timeout::After(remaining)) {
                return None;
            }
            let timestamp = self.collect_tx_completions(Some(token));
            if !self.contexts.is_live(token) {
                return Some(timestamp);
            }
            if deadline.expired(self.platform.now_ms()) {
                return None;
            }
        }
    }

    // Contexts and buffers only come back through completion handling, which
    // runs under the section we hold. Wait a bounded time for hardware to
    // finish outstanding frames, collect, and try again.
    fn allocate_tx_context(&self) -> TxToken {
        loop {
            if let Some(token) = self.contexts.allocate(Timeout::After(self.config.tx_timeout)) {
                return token;
            }
            self.collect_tx_completions(None);
        }
    }

    fn allocate_tx_buffer(&self) -> BufferIndex {
        loop {
            if let Some(buffer) = self.dma.tx_pool.allocate(Timeout::After(self.config.tx_timeout)) {
                return buffer;
            }
            self.collect_tx_completions(None);
        }
    }

    /// Copy the frame into a linked chain of pool buffers, `buffer_size`
    /// bytes per segment with the remainder in the last one.
    fn build_tx_chain<T: TxPacket + ?Sized>(&self, packet: &T) -> Result<BufferIndex, TxError> {
        let pool = &self.dma.tx_pool;
        let size = pool.buffer_size();
        let len = packet.len();

        let head = self.allocate_tx_buffer();
        let mut current = head;
        let mut offset = 0;
        loop {
            let segment = min(size, len - offset);
            // SAFETY: freshly allocated, no descriptor references it yet.
            let read = match unsafe { pool.bytes_mut(current) }.and_then(|b| b.get_mut(..segment)) {
                Some(out) => packet.read_at(offset, out).is_ok(),
                None => false,
            };
            if !read {
                error!("eth: failed to read {} payload bytes at offset {}", segment, offset);
                pool.release_chain(head);
                return Err(TxError::PacketRead);
            }
            pool.set_valid_length(current, segment);
            offset += segment;
            if offset >= len {
                return Ok(head);
            }

            let next = self.allocate_tx_buffer();
            pool.set_next(current, Some(next));
            current = next;
        }
    }

    fn is_ptp_frame(&self, head: BufferIndex) -> bool {
        // SAFETY: the chain is still owned by software.
        let first = unsafe { self.dma.tx_pool.filled(head) };
        first.and_then(ethertype) == Some(ETH_P_PTP)
    }

    /// Hand the chain to hardware, one descriptor per buffer.
    fn submit_tx_chain(&self, token: TxToken, head: BufferIndex, timestamp: bool) -> Result<usize, TxError> {
        let ring = &self.dma.tx_ring;
        let pool = &self.dma.tx_pool;
        let segments = pool.chain(head).count();

        let extra = if timestamp { desc_flags::TIMESTAMP_REQUEST } else { 0 };
        for (i, buffer) in pool.chain(head).enumerate() {
            let mut flags = extra;
            if i == 0 {
                flags |= desc_flags::FIRST;
            }
            if i + 1 == segments {
                flags |= desc_flags::LAST;
            }
            if ring.push(buffer, pool.valid_length(buffer), flags, token.raw()).is_err() {
                error!("eth: tx ring full, {} of {} segments queued", i, segments);
                // Pushed segments go back through their descriptors, the
                // rest straight from the chain.
                self.reclaim_tx(token);
                pool.release_chain(buffer);
                self.stats.tx_error();
                return Err(TxError::Submit(HalError::RingFull));
            }
        }
        Ok(segments)
    }

    /// Completion handler: retire completed descriptors oldest first.
    ///
    /// Returns the egress timestamp of `waiting` if its last segment was
    /// among them.
    pub(super) fn collect_tx_completions(&self, waiting: Option<TxToken>) -> Option<PtpTime> {
        let ring = &self.dma.tx_ring;
        let mut timestamp = None;

        while ring.pending() > 0 {
            let Some(desc) = ring.get(ring.tail()) else {
                break;
            };
            match desc.ownership() {
                DescOwnership::SubmittedToHardware => break,
                // Revoked by the timeout path.
                DescOwnership::Free => ring.advance_tail(),
                DescOwnership::CompletedAwaitingSoftware => {
                    let token = TxToken::from_raw(desc.token());
                    let last = desc.is_last();
                    let captured = desc.timestamp();
                    let buffer = desc.buffer();
                    let _ = desc.reclaim();
                    ring.advance_tail();

                    if !self.contexts.is_live(token) {
                        if last {
                            warn!("eth: ignoring late completion for tx context {}", token);
                            self.stats.late_completion();
                        }
                        continue;
                    }

                    self.dma.tx_pool.release(buffer);
                    if last {
                        if waiting == Some(token) {
                            timestamp = captured;
                        }
                        self.contexts.release(token);
                    }
                }
            }
        }
        timestamp
    }

    /// Take back every descriptor of `token` and free its buffers and
    /// context. Not synchronized with a transfer hardware may still run.
    fn reclaim_tx(&self, token: TxToken) {
        let ring = &self.dma.tx_ring;
        for index in ring.pending_indices() {
            let Some(desc) = ring.get(index) else {
                continue;
            };
            if desc.token() != token.raw() {
                continue;
            }
            let ours = match desc.revoke() {
                Ok(()) => true,
                // Hardware won the race; treat it as ours anyway.
                Err(DescOwnership::CompletedAwaitingSoftware) => desc.reclaim().is_ok(),
                Err(_) => false,
            };
            if ours {
                self.dma.tx_pool.release(desc.buffer());
            }
        }
        self.contexts.release(token);
        self.collect_tx_completions(None);
    }

    fn log_tx_timeout(&self) {
        error!(
            "eth: tx completion timed out after {} ms",
            duration_ms(self.config.tx_timeout)
        );
        let state = self.hw.error_state();
        if let Some(code) = state.state_error {
            error!("eth: MAC in error state, code {:#x}", code);
        }
        if state.dma_errors != 0 {
            error!("eth: DMA error flags {:#x}", state.dma_errors);
        }
        if state.mac_errors != 0 {
            error!("eth: MAC error flags {:#x}", state.mac_errors);
        }
    }

    /// Pending completion signals (diagnostics and tests).
    pub fn tx_signal_pending(&self) -> bool {
        self.tx_done.count() > 0
    }
}
