//! Test doubles: a std-backed platform, a simulated MAC and PTP unit, and
//! worker/hardware threads driving a shared core.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::clock::{control, PtpRegisters, TIME_UPDATE_SUBTRACT};
use crate::config::CoreConfig;
use crate::dma::{DescOwnership, DmaArea, RxCompletion};
use crate::driver::{HalError, HwErrorState, IrqStatus, MacHardware, NetworkDeviceCore};
use crate::packet::{Frame, FrameSink, HeapAllocator, PacketError};
use crate::platform::Platform;
use crate::sync::Semaphore;
use crate::time::Timeout;
use crate::types::{LinkState, PtpTime, NSEC_PER_SEC};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ═══════════════════════════════════════════════════════════════════════════
// PLATFORM
// ═══════════════════════════════════════════════════════════════════════════

pub struct StdSemaphore {
    count: Mutex<u32>,
    cv: Condvar,
    limit: u32,
}

impl StdSemaphore {
    pub fn new(initial: u32, limit: u32) -> Self {
        Self {
            count: Mutex::new(initial.min(limit)),
            cv: Condvar::new(),
            limit,
        }
    }
}

impl Semaphore for StdSemaphore {
    fn give(&self) {
        let mut count = lock(&self.count);
        if *count < self.limit {
            *count += 1;
            self.cv.notify_one();
        }
    }

    fn take(&self, timeout: Timeout) -> bool {
        let mut count = lock(&self.count);
        match timeout {
            Timeout::NoWait => {}
            Timeout::Forever => {
                while *count == 0 {
                    count = self.cv.wait(count).unwrap_or_else(|e| e.into_inner());
                }
            }
            Timeout::After(d) => {
                let deadline = Instant::now() + d;
                while *count == 0 {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    count = self
                        .cv
                        .wait_timeout(count, deadline - now)
                        .unwrap_or_else(|e| e.into_inner())
                        .0;
                }
            }
        }
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    fn reset(&self) {
        *lock(&self.count) = 0;
    }

    fn count(&self) -> u32 {
        *lock(&self.count)
    }
}

#[derive(Clone)]
pub struct StdPlatform {
    epoch: Instant,
    irq_mask: Arc<Mutex<()>>,
}

impl StdPlatform {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            irq_mask: Arc::new(Mutex::new(())),
        }
    }
}

impl Platform for StdPlatform {
    type Semaphore = StdSemaphore;

    fn semaphore(&self, initial: u32, limit: u32) -> StdSemaphore {
        StdSemaphore::new(initial, limit)
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn critical_section<R>(&self, f: impl FnOnce() -> R) -> R {
        let _masked = lock(&self.irq_mask);
        f()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PTP UNIT
// ═══════════════════════════════════════════════════════════════════════════

/// Register-visible state of the simulated PTP unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PtpSnapshot {
    pub control: u32,
    pub increment: u8,
    pub addend: u32,
    pub latched_addend: u32,
    pub staged: (u32, u32),
    pub seconds: u32,
    pub nanoseconds: u32,
}

#[derive(Default)]
struct SimPtpRegs {
    snap: PtpSnapshot,
    seconds_script: VecDeque<u32>,
    nanos_script: VecDeque<u32>,
    stuck: bool,
}

/// PTP unit whose self-clearing commands take effect immediately.
#[derive(Clone, Default)]
pub struct SimPtp {
    regs: Arc<Mutex<SimPtpRegs>>,
}

impl SimPtp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PtpSnapshot {
        lock(&self.regs).snap.clone()
    }

    /// Next `get` sees `first` seconds, `nanos`, then `second` seconds.
    pub fn script_read(&self, first: u32, nanos: u32, second: u32) {
        let mut regs = lock(&self.regs);
        regs.seconds_script.extend([first, second]);
        regs.nanos_script.push_back(nanos);
    }

    /// Stop clearing command bits.
    pub fn set_stuck(&self, stuck: bool) {
        lock(&self.regs).stuck = stuck;
    }
}

impl PtpRegisters for SimPtp {
    fn read_control(&self) -> u32 {
        lock(&self.regs).snap.control
    }

    fn write_control(&self, value: u32) {
        let mut regs = lock(&self.regs);
        regs.snap.control = value;
        if regs.stuck {
            return;
        }
        let snap = &mut regs.snap;
        if value & control::INIT != 0 {
            snap.seconds = snap.staged.0;
            snap.nanoseconds = snap.staged.1;
        }
        if value & control::UPDATE != 0 {
            let ns = NSEC_PER_SEC as i128;
            let now = snap.seconds as i128 * ns + snap.nanoseconds as i128;
            let (sec, word) = snap.staged;
            let field = (word & !TIME_UPDATE_SUBTRACT) as i128;
            let updated = if word & TIME_UPDATE_SUBTRACT != 0 {
                now - (sec as i128 * ns + (ns - field))
            } else {
                now + sec as i128 * ns + field
            };
            snap.seconds = (updated / ns) as u32;
            snap.nanoseconds = (updated % ns) as u32;
        }
        if value & control::ADDEND_UPDATE != 0 {
            snap.latched_addend = snap.addend;
        }
        snap.control &= !(control::INIT | control::UPDATE | control::ADDEND_UPDATE);
    }

    fn write_subsecond_increment(&self, increment: u8) {
        lock(&self.regs).snap.increment = increment;
    }

    fn write_addend(&self, addend: u32) {
        lock(&self.regs).snap.addend = addend;
    }

    fn write_time_update(&self, seconds: u32, nanoseconds: u32) {
        lock(&self.regs).snap.staged = (seconds, nanoseconds);
    }

    fn read_seconds(&self) -> u32 {
        let mut regs = lock(&self.regs);
        let scripted = regs.seconds_script.pop_front();
        scripted.unwrap_or(regs.snap.seconds)
    }

    fn read_nanoseconds(&self) -> u32 {
        let mut regs = lock(&self.regs);
        let scripted = regs.nanos_script.pop_front();
        scripted.unwrap_or(regs.snap.nanoseconds)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MAC
// ═══════════════════════════════════════════════════════════════════════════

/// A frame the simulated MAC put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub bytes: Vec<u8>,
    pub segment_lens: Vec<usize>,
    pub timestamp_requested: bool,
}

#[derive(Default)]
struct MacState {
    started: bool,
    link: Option<LinkState>,
    irq: IrqStatus,
    error: HwErrorState,
    tx_demands: usize,
    tx_served: usize,
    rx_demands: usize,
    refuse_tx: Option<HalError>,
    tx_stalled: bool,
    tx_pos: usize,
    rx_pos: usize,
    partial: Option<SentFrame>,
    sent: Vec<SentFrame>,
}

/// Simulated MAC operating directly on the core's DMA area.
#[derive(Clone)]
pub struct SimMac {
    state: Arc<Mutex<MacState>>,
    ptp: Option<SimPtp>,
}

impl SimMac {
    pub fn new() -> Self {
        Self {
            state: Arc::default(),
            ptp: Some(SimPtp::new()),
        }
    }

    pub fn without_ptp() -> Self {
        Self { ptp: None, ..Self::new() }
    }

    /// Latch interrupt causes for the next `acknowledge_interrupts`.
    pub fn raise(&self, tx: bool, rx: bool, dma_errors: u32, mac_errors: u32) {
        let mut state = lock(&self.state);
        state.irq.tx_complete |= tx;
        state.irq.rx_complete |= rx;
        state.irq.dma_errors |= dma_errors;
        state.irq.mac_errors |= mac_errors;
    }

    pub fn set_error_state(&self, error: HwErrorState) {
        lock(&self.state).error = error;
    }

    pub fn refuse_transmit(&self, error: Option<HalError>) {
        lock(&self.state).refuse_tx = error;
    }

    /// Withhold transmit completions.
    pub fn stall_tx(&self, stalled: bool) {
        lock(&self.state).tx_stalled = stalled;
    }

    pub fn rx_demands(&self) -> usize {
        lock(&self.state).rx_demands
    }

    pub fn tx_demands(&self) -> usize {
        lock(&self.state).tx_demands
    }

    pub fn last_link(&self) -> Option<LinkState> {
        lock(&self.state).link
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        lock(&self.state).sent.clone()
    }

    /// Transmit every descriptor hardware owns, in ring order. Returns the
    /// number of frames finished.
    pub fn process_tx<S: Semaphore>(&self, dma: &DmaArea<S>, timestamp: Option<PtpTime>) -> usize {
        let mut state = lock(&self.state);
        // The engine only scans after a poll demand.
        if state.tx_stalled || state.tx_served == state.tx_demands {
            return 0;
        }
        state.tx_served = state.tx_demands;
        let ring = &dma.tx_ring;
        let start = state.tx_pos;
        let mut finished = 0;
        // Slots software revoked are skipped.
        for step in 0..ring.capacity() {
            let index = (start + step) % ring.capacity();
            let Some(desc) = ring.get(index) else { break };
            if desc.ownership() != DescOwnership::SubmittedToHardware {
                continue;
            }
            let bytes = unsafe { dma.tx_pool.bytes(desc.buffer()) }.unwrap_or(&[]);
            let segment = bytes[..desc.len()].to_vec();

            let frame = state.partial.get_or_insert_with(|| SentFrame {
                bytes: Vec::new(),
                segment_lens: Vec::new(),
                timestamp_requested: false,
            });
            frame.bytes.extend_from_slice(&segment);
            frame.segment_lens.push(segment.len());
            frame.timestamp_requested |= desc.flags() & crate::dma::desc_flags::TIMESTAMP_REQUEST != 0;

            let last = desc.is_last();
            if desc.complete_transmit(timestamp).is_ok() && last {
                if let Some(frame) = state.partial.take() {
                    state.sent.push(frame);
                }
                finished += 1;
            }
            state.tx_pos = (index + 1) % ring.capacity();
        }
        finished
    }

    /// Write `frame` into the receive ring as hardware would. Returns
    /// `false` if there were not enough armed descriptors.
    pub fn deliver_rx<S: Semaphore>(&self, dma: &DmaArea<S>, frame: &[u8], timestamp: Option<PtpTime>) -> bool {
        let mut state = lock(&self.state);
        let ring = &dma.rx_ring;
        let size = dma.rx_pool.buffer_size();
        let segments = frame.len().div_ceil(size).max(1);

        let ready = (0..segments)
            .map(|i| (state.rx_pos + i) % ring.capacity())
            .all(|index| ring.get(index).map(|d| d.ownership()) == Some(DescOwnership::SubmittedToHardware));
        if segments > ring.capacity() || !ready {
            return false;
        }

        for (i, chunk) in frame.chunks(size).chain(frame.is_empty().then_some(&[][..])).enumerate() {
            let index = state.rx_pos;
            let Some(desc) = ring.get(index) else { return false };
            let buffer = unsafe { dma.rx_pool.bytes_mut(desc.buffer()) };
            if let Some(buffer) = buffer {
                buffer[..chunk.len()].copy_from_slice(chunk);
            }
            let last = i + 1 == segments;
            let _ = desc.complete_receive(RxCompletion {
                len: chunk.len(),
                first: i == 0,
                frame_len: last.then_some(frame.len()),
                error: false,
                timestamp: if last { timestamp } else { None },
            });
            state.rx_pos = (index + 1) % ring.capacity();
        }
        true
    }
}

impl MacHardware for SimMac {
    type Ptp = SimPtp;

    fn start(&self) -> Result<(), HalError> {
        lock(&self.state).started = true;
        Ok(())
    }

    fn stop(&self) -> Result<(), HalError> {
        lock(&self.state).started = false;
        Ok(())
    }

    fn configure_link(&self, link: LinkState) -> Result<(), HalError> {
        lock(&self.state).link = Some(link);
        Ok(())
    }

    fn transmit_demand(&self) -> Result<(), HalError> {
        let mut state = lock(&self.state);
        state.tx_demands += 1;
        match state.refuse_tx {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn receive_demand(&self) {
        lock(&self.state).rx_demands += 1;
    }

    fn acknowledge_interrupts(&self) -> IrqStatus {
        core::mem::take(&mut lock(&self.state).irq)
    }

    fn error_state(&self) -> HwErrorState {
        lock(&self.state).error
    }

    fn ptp_registers(&self) -> Option<SimPtp> {
        self.ptp.clone()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HARNESS
// ═══════════════════════════════════════════════════════════════════════════

pub type TestCore = NetworkDeviceCore<StdPlatform, SimMac>;

pub fn started_core(config: CoreConfig) -> Arc<TestCore> {
    let core = Arc::new(
        NetworkDeviceCore::new(config, StdPlatform::new(), SimMac::new()).expect("valid test config"),
    );
    core.start().expect("sim start");
    core
}

/// Collects delivered frames.
#[derive(Default)]
pub struct CollectSink {
    frames: Mutex<Vec<Frame>>,
    refuse: AtomicBool,
}

impl CollectSink {
    pub fn frames(&self) -> Vec<Frame> {
        lock(&self.frames).clone()
    }

    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::Relaxed);
    }

    /// Wait until `n` frames arrived.
    pub fn wait_for(&self, n: usize) -> Vec<Frame> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while lock(&self.frames).len() < n && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        self.frames()
    }
}

impl FrameSink<Frame> for CollectSink {
    fn deliver(&self, packet: Frame) -> Result<(), PacketError> {
        if self.refuse.load(Ordering::Relaxed) {
            return Err(PacketError::Rejected);
        }
        lock(&self.frames).push(packet);
        Ok(())
    }
}

/// Worker task on its own thread; shut down and joined on drop.
pub struct WorkerThread {
    core: Arc<TestCore>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerThread {
    pub fn spawn(core: &Arc<TestCore>, sink: Arc<CollectSink>) -> Self {
        let handle = {
            let core = Arc::clone(core);
            thread::spawn(move || core.run_worker(&HeapAllocator::new(1524 * 4), &*sink))
        };
        Self { core: Arc::clone(core), handle: Some(handle) }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.core.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Simulated DMA engine: completes transmit descriptors and raises the
/// interrupt, on its own thread.
pub struct HardwareThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HardwareThread {
    pub fn spawn(core: &Arc<TestCore>, timestamp: Option<PtpTime>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let core = Arc::clone(core);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if core.hardware().process_tx(core.dma(), timestamp) > 0 {
                        core.hardware().raise(true, false, 0, 0);
                        core.handle_interrupt();
                    }
                    thread::sleep(Duration::from_micros(200));
                }
            })
        };
        Self { stop, handle: Some(handle) }
    }
}

impl Drop for HardwareThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
