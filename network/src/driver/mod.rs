//! Driver core.
//!
//! [`NetworkDeviceCore`] and the pipelines that run on it:
//! - `tx`: segmentation, submission and the bounded completion wait
//! - `rx`: chain reassembly and ring refill
//! - `irq`: interrupt handler to event channel
//! - `worker`: the event dispatch loop

pub mod context;
pub mod device;
pub mod irq;
pub mod rx;
pub mod traits;
pub mod tx;
pub mod worker;

// Re-exports
pub use context::{TxContextPool, TxToken};
pub use device::NetworkDeviceCore;
pub use irq::{Event, EventChannel, EventSet};
pub use rx::RxChain;
pub use traits::{HalError, HwErrorState, IrqStatus, MacHardware, TxError};
pub use tx::TxReport;
pub use worker::Dispatch;
