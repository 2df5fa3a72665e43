//! Shared data types module.

pub mod ethernet;
pub mod link;
pub mod ptp;

pub use ethernet::{ethertype, ETH_ALEN, ETH_HLEN, ETH_P_IP, ETH_P_PTP};
pub use link::{LinkSpeed, LinkState};
pub use ptp::{PtpTime, NSEC_PER_SEC};
