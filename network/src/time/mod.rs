//! Time and timing module.
//!
//! Millisecond deadlines on top of the platform tick. Nothing here reads a
//! hardware timer directly; see [`Platform::now_ms`](crate::Platform::now_ms).

pub mod timeout;

pub use timeout::{Deadline, Timeout};
